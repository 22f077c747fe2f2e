use std::process::Command;

use crate::error::{LinkError, Result};

// Management SSH stays reachable while everything else is denied.
const MANAGEMENT_CLIENT: &str = "192.168.1.100";
const MANAGEMENT_HOST: &str = "192.168.1.105";

// Link-local address the WiFi stack keeps re-adding on the uplink.
const STALE_LINK_LOCAL: &str = "169.254.109.254/16";

const HIGHEST_PRIORITY: libc::c_int = -20;

/// Deny-by-default packet filtering, issued once before the pipeline
/// starts. The kernel must not answer traffic the bridge is relaying.
/// Setup failure here is fatal.
pub fn apply_firewall() -> Result<()> {
    let rules: &[&[&str]] = &[
        &["-P", "INPUT", "DROP"],
        &["-P", "OUTPUT", "DROP"],
        &["-P", "FORWARD", "DROP"],
        &[
            "-A", "INPUT", "-p", "tcp", "-s", MANAGEMENT_CLIENT, "-d", MANAGEMENT_HOST,
            "--sport", "513:65535", "--dport", "22", "-m", "state", "--state",
            "NEW,ESTABLISHED", "-j", "ACCEPT",
        ],
        &[
            "-A", "OUTPUT", "-p", "tcp", "-s", MANAGEMENT_HOST, "-d", MANAGEMENT_CLIENT,
            "--sport", "22", "--dport", "513:65535", "-m", "state", "--state",
            "ESTABLISHED", "-j", "ACCEPT",
        ],
    ];

    for rule in rules {
        let status = Command::new("iptables")
            .args(*rule)
            .status()
            .map_err(|err| LinkError::Setup(format!("running iptables failed: {err}")))?;
        if !status.success() {
            return Err(LinkError::Setup(format!(
                "iptables {} exited with {status}",
                rule.join(" ")
            )));
        }
    }

    info!("Firewall lockdown applied");
    Ok(())
}

/// Best-effort removal of the stale link-local address; a failure is
/// only worth a warning (the address may simply not be there).
pub fn drop_stale_link_local(iface: &str) {
    let result = Command::new("ip")
        .args(["addr", "del", STALE_LINK_LOCAL, "dev", iface])
        .status();

    match result {
        Ok(status) if status.success() => {
            info!("Removed stale link-local address from {iface}")
        }
        Ok(_) => {}
        Err(err) => warn!("Could not run ip addr del on {iface}: {err}"),
    }
}

/// Raises the process to the highest scheduling priority; the polling
/// loops are timing-sensitive. Degrades to a warning without root.
pub fn raise_priority() {
    let raised = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, HIGHEST_PRIORITY) };
    if raised < 0 {
        warn!(
            "Could not raise process priority: {}",
            std::io::Error::last_os_error()
        );
    }
}
