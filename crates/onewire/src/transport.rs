use std::io;
use std::path::Path;

/// Filesystem-like access to a one-wire bus master.
///
/// Devices are addressed as `<base>/<device-id>/<attribute>`.
pub trait OneWireTransport: Send + Sync + 'static {
    /// Names of the entries directly under `path`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Whole contents of the attribute at `path`.
    fn read(&self, path: &Path) -> io::Result<String>;

    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Transport backed by the Linux `w1` sysfs tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysfsTransport;

impl OneWireTransport for SysfsTransport {
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        // read_dir order is unspecified; keep enumeration stable between calls.
        names.sort();
        Ok(names)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::OneWireTransport;
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use thermo_core::lock;

    pub const BASE: &str = "/w1";

    /// In-memory bus used by the tests of this crate.
    #[derive(Debug, Default)]
    pub struct MemoryTransport {
        dirs:  Mutex<HashMap<PathBuf, Vec<String>>>,
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl MemoryTransport {
        /// A bus under [`BASE`] with one device and the usual master entries.
        pub fn with_device(id: &str, temperature: &str) -> Arc<Self> {
            let bus = Self::default();
            bus.add_entry(BASE, id);
            bus.add_entry(BASE, "w1_bus_master1");
            bus.set_file(&format!("{BASE}/{id}/temperature"), temperature);
            bus.set_file(&format!("{BASE}/{id}/resolution"), "12\n");
            Arc::new(bus)
        }

        pub fn add_entry(&self, dir: &str, name: &str) {
            lock(&self.dirs)
                .entry(PathBuf::from(dir))
                .or_default()
                .push(name.to_string());
        }

        pub fn remove_entry(&self, dir: &str, name: &str) {
            if let Some(names) = lock(&self.dirs).get_mut(Path::new(dir)) {
                names.retain(|n| n != name);
            }
        }

        pub fn set_file(&self, path: &str, contents: &str) {
            lock(&self.files).insert(PathBuf::from(path), contents.to_string());
        }

        pub fn remove_file(&self, path: &str) {
            lock(&self.files).remove(Path::new(path));
        }

        pub fn file(&self, path: &str) -> Option<String> {
            lock(&self.files).get(Path::new(path)).cloned()
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
    }

    impl OneWireTransport for MemoryTransport {
        fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
            lock(&self.dirs).get(path).cloned().ok_or_else(|| not_found(path))
        }

        fn read(&self, path: &Path) -> io::Result<String> {
            lock(&self.files).get(path).cloned().ok_or_else(|| not_found(path))
        }

        fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            let mut files = lock(&self.files);
            match files.get_mut(path) {
                Some(file) => {
                    *file = contents.to_string();
                    Ok(())
                }
                None => Err(not_found(path)),
            }
        }
    }
}
