use std::path::PathBuf;

/// Default JSON-RPC (raw TCP) port of the host media center.
pub const HOST_RPC_PORT: u16 = 9090;
const HOST_RPC_HOST: &str = "127.0.0.1";

/// Default port of the property socket served to skin-side clients.
pub const PROPERTY_SOCKET_PORT: u16 = 9191;

pub fn host_address() -> String {
    format!("{}:{}", HOST_RPC_HOST, HOST_RPC_PORT)
}

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/skinhelper/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("skinhelper")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skinhelper")
    }
}

pub fn config_dir() -> PathBuf {
    // On Windows, a config.toml beside the executable wins (portable installs)
    #[cfg(windows)]
    {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                if exe_dir.join("config.toml").exists() {
                    return exe_dir.to_path_buf();
                }
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("skinhelper")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skinhelper")
    }
}

pub fn log_file() -> PathBuf {
    data_dir().join("daemon.log")
}
