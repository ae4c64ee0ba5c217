/*
 * Locates the per-user directory where the pruner keeps its settings. Only the
 * local (non-roaming) configuration directory is used.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Returns the local configuration directory for `app_name`, creating it when
 * missing. `None` means the platform offers no such directory or it could not
 * be created; the cause has already been logged.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving config dir for '{app_name}'.");
    let proj_dirs = ProjectDirs::from("", "", app_name)?;
    let config_dir = proj_dirs.config_local_dir();
    ensure_dir(config_dir).then(|| config_dir.to_path_buf())
}

/* Joins `file_name` onto the config dir of `app_name`. */
pub fn get_config_file_path(app_name: &str, file_name: &str) -> Option<PathBuf> {
    get_base_app_config_local_dir(app_name).map(|dir| dir.join(file_name))
}

fn ensure_dir(dir: &Path) -> bool {
    if dir.is_dir() {
        return true;
    }
    match fs::create_dir_all(dir) {
        Ok(()) => {
            log::debug!("PathUtils: Created config directory {dir:?}.");
            true
        }
        Err(e) => {
            log::error!("PathUtils: Failed to create config directory {dir:?}: {e}");
            false
        }
    }
}
