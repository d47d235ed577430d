//! # Example: preload
//!
//! Defines a few chunks against one [`Preloader`], drains them the way a pre-render step would,
//! then mounts one and retries it.
//!
//! Demonstrates how to:
//! - Define single and keyed chunks with delay, timeout and backoff options.
//! - Force every registered chunk to settle with `preload_all()`.
//! - Gate a chunk on external resources with `preload_ready()`.
//! - Observe `past_delay` / `timed_out` and retry a failed chunk.
//!
//! ## Flow
//! ```text
//! Preloader::builder(cfg).with_subscribers([LogWriter]).with_probe(resources).build()
//!     ├─► chunk("settings")   backoff [100, 200]
//!     ├─► chunks("panels")    {left, right}
//!     └─► chunk("vendor")     resources ["vendor.js"]
//!
//! preload_all()    ─► settings (fails once, then loads), panels, vendor
//! preload_ready()  ─► nothing left to run
//! mount("flaky")   ─► fails ─► retry() ─► loads
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example preload --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use loadvisor::{
    BackoffSchedule, LoadError, LoaderFn, LoaderRef, LogWriter, PreloadConfig, Preloader,
    ResourceSet, Subscribe,
};

/// Loader failing its first `failures` attempts.
fn flaky(name: &'static str, failures: u32, work_ms: u64) -> LoaderRef<String> {
    let attempts = Arc::new(AtomicU32::new(0));
    LoaderFn::arc(name, move || {
        let attempts = attempts.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(work_ms)).await;
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                return Err(LoadError::failed(format!("{name}: attempt {n} failed")));
            }
            Ok(format!("{name} (attempt {n})"))
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let resources = Arc::new(ResourceSet::new());
    resources.insert("vendor.js");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let preloader = Preloader::builder(PreloadConfig::default())
        .with_subscribers(subs)
        .with_probe(resources.clone())
        .build();

    let settings = preloader
        .chunk(flaky("settings", 1, 50))
        .with_timeout(Duration::from_millis(500))
        .with_backoff(BackoffSchedule::from_millis([100, 200]))
        .build()?;

    let panels = preloader
        .chunks(
            "panels",
            vec![
                ("left".to_string(), flaky("left", 0, 80)),
                ("right".to_string(), flaky("right", 0, 120)),
            ],
        )
        .with_resolve(|v: &String, key: &str| format!("{key} => {v}"))
        .build()?;

    let _vendor = preloader
        .chunk(flaky("vendor", 0, 30))
        .with_resources(|| vec!["vendor.js".into()])
        .build()?;

    preloader.preload_all().await?;
    preloader.preload_ready().await?;

    println!("settings: {:?}", settings.mount().view().imported);
    println!("panels:   {:?}", panels.mount().view().imported);

    let unlucky = preloader
        .chunk(flaky("unlucky", 1, 300))
        .with_delay(Duration::from_millis(100))
        .build()?;
    let mut handle = unlucky.mount();
    while handle.changed().await {
        let view = handle.view();
        println!(
            "unlucky:  loading={} past_delay={} error={:?}",
            view.is_loading, view.past_delay, view.error
        );
        if view.error.is_some() {
            break;
        }
    }

    handle.retry().await?;
    println!("unlucky:  {:?}", handle.view().imported);

    // give the subscriber worker a moment to print the tail of the event stream
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
