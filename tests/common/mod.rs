use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diskramp::io::{DiskIO, PlatformDiskIO, TargetFile};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer().with_target(true))
            .with(filter)
            .init();
    });
}

/// Real filesystem writes, except that opening files with the given name fails
pub struct FailingDisk {
    inner: PlatformDiskIO,
    fail_name: &'static str,
    pub opens: Arc<AtomicUsize>,
}

impl FailingDisk {
    pub fn new(fail_name: &'static str) -> Self {
        Self {
            inner: PlatformDiskIO::new(),
            fail_name,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl DiskIO for FailingDisk {
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn TargetFile>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if path.file_name().and_then(|n| n.to_str()) == Some(self.fail_name) {
            return Err(io::Error::new(io::ErrorKind::Other, "No space left on device"));
        }
        self.inner.open_write(path)
    }
}

#[allow(dead_code)]
pub fn benchmark_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
