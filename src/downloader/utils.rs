// Helper functions shared by the engine and the UI

use serde::{Deserialize, Serialize};
use std::net::TcpStream;
use std::process::Stdio;
use std::time::Duration;
use time::macros::format_description;
use time::Date;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

/// Network status information for UI display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub proxy: Option<String>,
    pub mode: String, // "direct" or "proxy"
    pub external_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    ip: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimpleIp {
    ip: String,
}

/// Run command with timeout, collecting both output streams.
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status =
                status_res.map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}s", timeout_secs))
        }
    }
}

/// Format duration from seconds to HH:MM:SS / MM:SS
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "N/A".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format a byte count in human readable units
pub fn format_filesize(size: Option<u64>) -> String {
    let Some(size) = size else {
        return "Unknown size".to_string();
    };
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} PB", value)
}

/// Format large numbers with thousands separators
pub fn format_number(num: Option<u64>) -> String {
    let Some(num) = num else {
        return "N/A".to_string();
    };
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Render the engine's 8-digit calendar string (YYYYMMDD) as YYYY-MM-DD.
/// Strings that do not parse as a date pass through untouched.
pub fn format_upload_date(raw: &str) -> String {
    let compact = format_description!("[year][month][day]");
    let dashed = format_description!("[year]-[month]-[day]");
    match Date::parse(raw, &compact) {
        Ok(date) => date.format(&dashed).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

/// Get external IP address via HTTP services
pub async fn get_external_ip(proxy: Option<String>) -> Option<String> {
    let client_builder = reqwest::Client::builder().timeout(Duration::from_secs(10));

    let client = if let Some(proxy_url) = proxy.as_deref() {
        match reqwest::Proxy::all(proxy_url) {
            Ok(p) => client_builder.proxy(p).build().ok()?,
            Err(e) => {
                eprintln!("[IpCheck] Invalid proxy URL {}: {}", proxy_url, e);
                return None;
            }
        }
    } else {
        client_builder.build().ok()?
    };

    let services = [
        "https://ipinfo.io/json",
        "https://api.ipify.org?format=json",
        "https://ifconfig.me/all.json",
    ];

    for service in services {
        match client.get(service).send().await {
            Ok(response) => {
                if let Ok(text) = response.text().await {
                    if let Ok(info) = serde_json::from_str::<IpInfoResponse>(&text) {
                        if let Some(ip) = info.ip {
                            return Some(match info.country {
                                Some(country) => format!("{} ({})", ip, country),
                                None => ip,
                            });
                        }
                    }
                    if let Ok(simple) = serde_json::from_str::<SimpleIp>(&text) {
                        return Some(simple.ip);
                    }
                }
            }
            Err(e) => {
                eprintln!("[IpCheck] Service {} failed: {}", service, e);
                continue;
            }
        }
    }

    eprintln!("[IpCheck] All services failed");
    None
}

/// Get current network status (proxy, mode, IP)
pub async fn get_network_status_info(user_proxy: Option<String>) -> NetworkStatus {
    let proxy = user_proxy.or_else(auto_detect_proxy);

    let mode = match &proxy {
        Some(_) => "proxy".to_string(),
        None => "direct".to_string(),
    };

    let external_ip = get_external_ip(proxy.clone()).await;

    NetworkStatus {
        proxy,
        mode,
        external_ip,
    }
}

/// Auto-detect a local SOCKS5 proxy on the common ports
pub fn auto_detect_proxy() -> Option<String> {
    let common_ports = [1080, 7890, 10808, 1081];

    for port in common_ports {
        if test_socks5_port(port) {
            eprintln!("[ProxyDetect] Found SOCKS5 on port {}", port);
            return Some(format!("socks5h://127.0.0.1:{}", port));
        }
    }

    None
}

fn test_socks5_port(port: u16) -> bool {
    let addr = format!("127.0.0.1:{}", port);
    match addr.parse() {
        Ok(addr) => TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "N/A");
        assert_eq!(format_duration(59), "00:59");
        assert_eq!(format_duration(61), "01:01");
        assert_eq!(format_duration(3661), "01:01:01");
    }

    #[test]
    fn test_format_filesize() {
        assert_eq!(format_filesize(None), "Unknown size");
        assert_eq!(format_filesize(Some(512)), "512.0 B");
        assert_eq!(format_filesize(Some(1536)), "1.5 KB");
        assert_eq!(format_filesize(Some(5 * 1024 * 1024)), "5.0 MB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(None), "N/A");
        assert_eq!(format_number(Some(999)), "999");
        assert_eq!(format_number(Some(1000)), "1,000");
        assert_eq!(format_number(Some(1234567)), "1,234,567");
    }

    #[test]
    fn test_format_upload_date() {
        assert_eq!(format_upload_date("20240115"), "2024-01-15");
        assert_eq!(format_upload_date("not-a-date"), "not-a-date");
        assert_eq!(format_upload_date(""), "");
    }
}
