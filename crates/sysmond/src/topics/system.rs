//! Operating system identification.

use std::ffi::OsStr;

use nix::sys::utsname::uname;
use serde::Serialize;

use sysmon_protocol::HandlerError;

/// Host and kernel identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemSnapshot {
    /// Network node name.
    pub name: String,
    /// Kernel name, for example `Linux`.
    pub system: String,
    /// Combined platform label such as `Linux-6.1.0-x86_64`.
    pub platform: String,
    /// Kernel release.
    pub release: String,
    /// Kernel build version.
    pub version: String,
    /// Hardware architecture.
    pub machine: String,
}

impl SystemSnapshot {
    fn from_parts(name: &OsStr, system: &OsStr, release: &OsStr, version: &OsStr, machine: &OsStr) -> Self {
        let system = system.to_string_lossy().into_owned();
        let release = release.to_string_lossy().into_owned();
        let machine = machine.to_string_lossy().into_owned();
        Self {
            name: name.to_string_lossy().into_owned(),
            platform: format!("{system}-{release}-{machine}"),
            system,
            release,
            version: version.to_string_lossy().into_owned(),
            machine,
        }
    }
}

pub(super) fn collect() -> Result<SystemSnapshot, HandlerError> {
    let uts = uname().map_err(|errno| HandlerError::from_error(&errno))?;
    Ok(SystemSnapshot::from_parts(
        uts.nodename(),
        uts.sysname(),
        uts.release(),
        uts.version(),
        uts.machine(),
    ))
}
