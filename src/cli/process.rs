use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

const DAEMON_EXECUTABLE: &str = "focusboard-daemon";

/// Executables a running daemon can belong to: this one (`serve`) and the standalone daemon
/// next to it.
pub fn server_executables() -> Result<Vec<PathBuf>> {
    let current = env::current_exe()?;
    let daemon = current.with_file_name(format!("{DAEMON_EXECUTABLE}{}", env::consts::EXE_SUFFIX));
    Ok(vec![current, daemon])
}

pub fn kill_previous_servers(names: &[PathBuf]) -> Result<()> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get the current pid: {e}"))?;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| names.iter().any(|name| name == v))
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // This will forcefully terminate the process on Windows.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
    Ok(())
}

/// Shuts down a previous daemon and starts a new one as a detached `serve` process working on
/// `application_path`.
pub fn restart_server(application_path: &Path) -> Result<()> {
    let executables = server_executables()?;
    kill_previous_servers(&executables)?;
    let mut command = std::process::Command::new(&executables[0]);
    command.arg("serve").arg("--dir").arg(application_path);

    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    println!("Spawning");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}
