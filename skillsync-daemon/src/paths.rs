use std::path::{Path, PathBuf};

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn skillsync_root(home: &Path) -> PathBuf {
    home.join(".skillsync")
}

pub fn socket_path(home: &Path) -> PathBuf {
    skillsync_root(home).join(DAEMON_SOCKET)
}
