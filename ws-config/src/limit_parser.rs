// Parsing for container resource limits.
//
// Limits are written as Kubernetes quantities:
// - CPU: "2", "0.5", "500m"
// - Memory: "512Mi", "2Gi", "1G", "1024" (bytes), and the lowercase
//   "512mb" / "1gb" spellings accepted elsewhere in the tool
//
// The managed-container backend needs the same limits as Fargate CPU units
// (1024 per vCPU) and MiB, so the conversions live here as well.

const KI: u64 = 1024;
const MI: u64 = KI * 1024;
const GI: u64 = MI * 1024;
const TI: u64 = GI * 1024;

/// Parse a CPU quantity into millicores.
///
/// # Examples
/// ```
/// # use ws_config::limit_parser::parse_cpu_millis;
/// assert_eq!(parse_cpu_millis("1").unwrap(), 1000);
/// assert_eq!(parse_cpu_millis("0.25").unwrap(), 250);
/// assert_eq!(parse_cpu_millis("500m").unwrap(), 500);
/// ```
pub fn parse_cpu_millis(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("CPU limit is empty".to_string());
    }

    if let Some(millis) = s.strip_suffix('m') {
        return millis
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("Invalid CPU value: '{}'", s));
    }

    let cores = parse_float(s)?;
    if cores <= 0.0 {
        return Err(format!("CPU limit must be positive, got: '{}'", s));
    }
    Ok((cores * 1000.0).round() as u64)
}

/// Parse a memory quantity into bytes.
///
/// # Examples
/// ```
/// # use ws_config::limit_parser::parse_memory_bytes;
/// assert_eq!(parse_memory_bytes("512Mi").unwrap(), 512 * 1024 * 1024);
/// assert_eq!(parse_memory_bytes("1G").unwrap(), 1_000_000_000);
/// assert_eq!(parse_memory_bytes("1gb").unwrap(), 1024 * 1024 * 1024);
/// ```
pub fn parse_memory_bytes(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Memory limit is empty".to_string());
    }

    // Binary suffixes are case-sensitive in Kubernetes quantities.
    for (suffix, factor) in [("Ki", KI), ("Mi", MI), ("Gi", GI), ("Ti", TI)] {
        if let Some(num) = s.strip_suffix(suffix) {
            return scale(num, factor as f64, s);
        }
    }

    let lower = s.to_lowercase();
    for (suffix, factor) in [("kb", KI), ("mb", MI), ("gb", GI)] {
        if let Some(num) = lower.strip_suffix(suffix) {
            return scale(num, factor as f64, s);
        }
    }

    for (suffix, factor) in [("k", 1e3), ("M", 1e6), ("G", 1e9), ("T", 1e12)] {
        if let Some(num) = s.strip_suffix(suffix) {
            return scale(num, factor, s);
        }
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid memory value: '{}'", s))
}

/// Fargate CPU units for a millicore value (1024 units per vCPU).
pub fn fargate_cpu_units(millis: u64) -> u64 {
    millis * 1024 / 1000
}

/// Whole MiB needed to hold `bytes`, rounded up.
pub fn mebibytes(bytes: u64) -> u64 {
    bytes.div_ceil(MI)
}

fn scale(num: &str, factor: f64, original: &str) -> Result<u64, String> {
    let value = parse_float(num.trim())?;
    if value < 0.0 {
        return Err(format!("Memory limit must not be negative, got: '{}'", original));
    }
    Ok((value * factor) as u64)
}

fn parse_float(s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("Invalid numeric value: '{}'", s))
}
