//! WiFi control service.
//!
//! Shells out to the system network tools (`nmcli`, with an `iwlist`
//! fallback for scanning) and reports results back over the event channel.
//! Scans and connects take seconds, so the navigator fires a command and
//! keeps rendering; it never waits on this task.

use eyre::Context;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, info, warn};

const SCAN_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_NETWORKS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: String,
    /// Signal strength in percent, 0..=100.
    pub signal: u8,
    pub security: String,
    pub connected: bool,
}

#[derive(Debug, Clone)]
pub enum NetCommand {
    Scan,
    Status,
    Connect { ssid: Arc<str>, password: String },
    Disconnect,
}

#[derive(Debug, Clone)]
pub enum NetEvent {
    ScanFinished(Vec<WifiNetwork>),
    Status(Option<String>),
    ConnectFinished {
        ssid: Arc<str>,
        ok: bool,
        message: String,
    },
}

#[tracing::instrument(skip_all)]
pub async fn run(
    event_tx: Sender<NetEvent>,
    mut command_rx: Receiver<NetCommand>,
) -> eyre::Result<()> {
    while let Some(command) = command_rx.recv().await {
        match command {
            NetCommand::Scan => {
                let networks = scan_networks().await;
                info!("Scan finished, {} networks", networks.len());
                event_tx.send(NetEvent::ScanFinished(networks)).await?;
            }
            NetCommand::Status => {
                event_tx
                    .send(NetEvent::Status(current_connection().await))
                    .await?;
            }
            NetCommand::Connect { ssid, password } => {
                let (ok, message) = connect(&ssid, &password).await;
                event_tx
                    .send(NetEvent::ConnectFinished { ssid, ok, message })
                    .await?;
            }
            NetCommand::Disconnect => {
                disconnect().await;
                event_tx
                    .send(NetEvent::Status(current_connection().await))
                    .await?;
            }
        }
    }
    info!("Net command channel closed, shutting down");
    Ok(())
}

async fn run_tool(program: &str, args: &[&str], timeout: Duration) -> eyre::Result<String> {
    let output = tokio::time::timeout(timeout, Command::new(program).args(args).output())
        .await
        .with_context(|| format!("{program} timed out"))?
        .with_context(|| format!("Failed to spawn {program}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        eyre::bail!(
            "{program} exited with {}: {}",
            output.status,
            if stderr.is_empty() {
                "no error output".to_string()
            } else {
                stderr
            }
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn scan_networks() -> Vec<WifiNetwork> {
    match run_tool(
        "nmcli",
        &["-t", "-f", "IN-USE,SSID,SIGNAL,SECURITY", "dev", "wifi"],
        SCAN_TIMEOUT,
    )
    .await
    {
        Ok(stdout) => dedup_by_signal(parse_nmcli_scan(&stdout)),
        Err(e) => {
            warn!(error = %e, "nmcli scan failed, falling back to iwlist");
            match run_tool("iwlist", &["scan"], SCAN_TIMEOUT).await {
                Ok(stdout) => dedup_by_signal(parse_iwlist_scan(&stdout)),
                Err(e) => {
                    warn!(error = %e, "iwlist scan failed");
                    Vec::new()
                }
            }
        }
    }
}

async fn current_connection() -> Option<String> {
    let stdout = run_tool(
        "nmcli",
        &["-t", "-f", "ACTIVE,SSID", "dev", "wifi"],
        STATUS_TIMEOUT,
    )
    .await
    .map_err(|e| debug!(error = %e, "nmcli status failed"))
    .ok()?;
    stdout.lines().find_map(|line| {
        let fields = terse_fields(line);
        match (fields.first().map(String::as_str), fields.get(1)) {
            (Some("yes"), Some(ssid)) if !ssid.is_empty() => Some(ssid.clone()),
            _ => None,
        }
    })
}

async fn connect(ssid: &str, password: &str) -> (bool, String) {
    let mut args = vec!["dev", "wifi", "connect", ssid];
    if !password.is_empty() {
        args.push("password");
        args.push(password);
    }
    match run_tool("nmcli", &args, CONNECT_TIMEOUT).await {
        Ok(_) => (true, format!("Connected to {ssid}")),
        Err(e) => (false, e.to_string()),
    }
}

async fn disconnect() {
    if let Err(e) = run_tool("nmcli", &["dev", "disconnect", "wifi"], STATUS_TIMEOUT).await {
        warn!(error = %e, "nmcli disconnect failed");
    }
}

/// Splits one line of `nmcli -t` output. Fields are colon-separated with
/// `\:` escapes, so SSIDs containing colons survive.
fn terse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_nmcli_scan(stdout: &str) -> Vec<WifiNetwork> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields = terse_fields(line);
            let in_use = fields.first()?;
            let ssid = fields.get(1)?;
            if ssid.is_empty() {
                return None;
            }
            let signal = fields.get(2)?.parse::<u8>().unwrap_or(0).min(100);
            let security = fields.get(3).cloned().unwrap_or_default();
            Some(WifiNetwork {
                ssid: ssid.clone(),
                signal,
                security,
                connected: in_use.contains('*'),
            })
        })
        .collect()
}

fn parse_iwlist_scan(stdout: &str) -> Vec<WifiNetwork> {
    static ESSID_PATTERN: OnceLock<Regex> = OnceLock::new();
    let essid_pattern = ESSID_PATTERN.get_or_init(|| {
        Regex::new(r#"ESSID:"([^"]*)""#).expect("Regular expression to be valid")
    });
    essid_pattern
        .captures_iter(stdout)
        .filter_map(|c| {
            let ssid = c[1].to_string();
            (!ssid.is_empty()).then_some(WifiNetwork {
                ssid,
                signal: 0,
                security: String::new(),
                connected: false,
            })
        })
        .collect()
}

/// One entry per SSID (strongest wins), strongest first, capped.
fn dedup_by_signal(networks: Vec<WifiNetwork>) -> Vec<WifiNetwork> {
    let mut unique: Vec<WifiNetwork> = Vec::new();
    for network in networks {
        match unique.iter_mut().find(|n| n.ssid == network.ssid) {
            Some(seen) => {
                if network.signal > seen.signal || network.connected {
                    *seen = network;
                }
            }
            None => unique.push(network),
        }
    }
    unique.sort_by(|a, b| b.signal.cmp(&a.signal));
    unique.truncate(MAX_NETWORKS);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terse_fields_honor_escapes_and_empty_fields() {
        assert_eq!(terse_fields("yes:HomeNet"), vec!["yes", "HomeNet"]);
        assert_eq!(terse_fields("a::b"), vec!["a", "", "b"]);
        assert_eq!(
            terse_fields(r"no:Weird\:Name:55"),
            vec!["no", "Weird:Name", "55"]
        );
    }

    #[test]
    fn nmcli_scan_lines_parse() {
        let stdout = "*:HomeNet:87:WPA2\n:CoffeeShop:54:\n:Weird\\:Name:33:WPA1 WPA2\n::12:\n";
        let networks = parse_nmcli_scan(stdout);
        assert_eq!(networks.len(), 3);
        assert_eq!(networks[0].ssid, "HomeNet");
        assert!(networks[0].connected);
        assert_eq!(networks[0].signal, 87);
        assert_eq!(networks[1].ssid, "CoffeeShop");
        assert!(!networks[1].connected);
        assert_eq!(networks[2].ssid, "Weird:Name");
        assert_eq!(networks[2].security, "WPA1 WPA2");
    }

    #[test]
    fn iwlist_fallback_extracts_essids() {
        let stdout = r#"
          Cell 01 - Address: AA:BB
                    ESSID:"HomeNet"
          Cell 02 - Address: CC:DD
                    ESSID:""
          Cell 03 - Address: EE:FF
                    ESSID:"Garage"
        "#;
        let networks = parse_iwlist_scan(stdout);
        assert_eq!(
            networks.iter().map(|n| n.ssid.as_str()).collect::<Vec<_>>(),
            vec!["HomeNet", "Garage"]
        );
    }

    #[test]
    fn duplicate_ssids_keep_the_strongest_entry() {
        let networks = dedup_by_signal(vec![
            WifiNetwork {
                ssid: "Mesh".into(),
                signal: 40,
                security: String::new(),
                connected: false,
            },
            WifiNetwork {
                ssid: "Mesh".into(),
                signal: 80,
                security: String::new(),
                connected: false,
            },
            WifiNetwork {
                ssid: "Other".into(),
                signal: 60,
                security: String::new(),
                connected: false,
            },
        ]);
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].ssid, "Mesh");
        assert_eq!(networks[0].signal, 80);
        assert_eq!(networks[1].ssid, "Other");
    }
}
