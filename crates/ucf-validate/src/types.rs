//! Built-in validator implementations.

use std::sync::LazyLock;

use regex::Regex;

use crate::expr::{Arg, Call};

/// Every validator name the expression language understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Integer,
    Uinteger,
    Float,
    Ufloat,
    Ipaddr,
    Ip4addr,
    Ip6addr,
    Port,
    Portrange,
    Macaddr,
    Host,
    Hostname,
    Network,
    Uciname,
    Wpakey,
    Wepkey,
    Phonedigit,
    Range,
    Min,
    Max,
    Rangelength,
    Minlength,
    Maxlength,
    List,
    Or,
    And,
    Neg,
}

impl Kind {
    pub fn from_name(name: &str) -> Option<Kind> {
        Some(match name {
            "string" => Kind::String,
            "integer" => Kind::Integer,
            "uinteger" => Kind::Uinteger,
            "float" => Kind::Float,
            "ufloat" => Kind::Ufloat,
            "ipaddr" => Kind::Ipaddr,
            "ip4addr" => Kind::Ip4addr,
            "ip6addr" => Kind::Ip6addr,
            "port" => Kind::Port,
            "portrange" => Kind::Portrange,
            "macaddr" => Kind::Macaddr,
            "host" => Kind::Host,
            "hostname" => Kind::Hostname,
            "network" => Kind::Network,
            "uciname" => Kind::Uciname,
            "wpakey" => Kind::Wpakey,
            "wepkey" => Kind::Wepkey,
            "phonedigit" => Kind::Phonedigit,
            "range" => Kind::Range,
            "min" => Kind::Min,
            "max" => Kind::Max,
            "rangelength" => Kind::Rangelength,
            "minlength" => Kind::Minlength,
            "maxlength" => Kind::Maxlength,
            "list" => Kind::List,
            "or" => Kind::Or,
            "and" => Kind::And,
            "neg" => Kind::Neg,
            _ => return None,
        })
    }
}

static RE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[0-9]+$").unwrap());
static RE_IP4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})(/(\S+))?$").unwrap());
static RE_IP6_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-fA-F0-9:.]+)(/(\d+))?$").unwrap());
static RE_IP6_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[a-fA-F0-9]{1,4}:){7}[a-fA-F0-9]{1,4}$").unwrap());
static RE_PORTRANGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").unwrap());
static RE_MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-fA-F0-9]{2}:){5}[a-fA-F0-9]{2}$").unwrap());
static RE_HOSTNAME_SIMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").unwrap());
static RE_HOSTNAME_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9_.-]*[a-zA-Z0-9]$").unwrap());
static RE_UCINAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());
static RE_HEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-fA-F0-9]+$").unwrap());
static RE_PHONEDIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9*#!.]+$").unwrap());

/// Formats a numeric argument for a failure message, dropping the
/// fractional part when it is zero.
pub(crate) fn fmt_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Call {
    fn num_arg(&self, idx: usize) -> Option<f64> {
        match self.args.get(idx) {
            Some(Arg::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Runs this validator against a value. `Err` carries the
    /// human-readable failure message.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self.kind {
            Kind::String => Ok(()),
            Kind::Integer => check_integer(value),
            Kind::Uinteger => {
                check_integer(value)
                    .ok()
                    .filter(|_| value.parse::<i64>().is_ok_and(|n| n >= 0))
                    .ok_or_else(|| "Must be a positive integer".to_string())
            }
            Kind::Float => check_float(value),
            Kind::Ufloat => {
                check_float(value)
                    .ok()
                    .filter(|_| value.trim().parse::<f64>().is_ok_and(|n| n >= 0.0))
                    .ok_or_else(|| "Must be a positive number".to_string())
            }
            Kind::Ipaddr => {
                if check_ip4(value).is_ok() || check_ip6(value).is_ok() {
                    Ok(())
                } else {
                    Err("Must be a valid IP address".to_string())
                }
            }
            Kind::Ip4addr => check_ip4(value),
            Kind::Ip6addr => check_ip6(value),
            Kind::Port => check_port(value),
            Kind::Portrange => check_portrange(value),
            Kind::Macaddr => {
                ensure(RE_MAC.is_match(value), "Must be a valid MAC address")
            }
            Kind::Host => {
                if check_hostname(value).is_ok()
                    || check_ip4(value).is_ok()
                    || check_ip6(value).is_ok()
                {
                    Ok(())
                } else {
                    Err("Must be a valid hostname or IP address".to_string())
                }
            }
            Kind::Hostname => check_hostname(value),
            Kind::Network => {
                if RE_UCINAME.is_match(value)
                    || check_hostname(value).is_ok()
                    || check_ip4(value).is_ok()
                    || check_ip6(value).is_ok()
                {
                    Ok(())
                } else {
                    Err("Must be a valid network name".to_string())
                }
            }
            Kind::Uciname => {
                ensure(RE_UCINAME.is_match(value), "Must be a valid UCI identifier")
            }
            Kind::Wpakey => check_wpakey(value),
            Kind::Wepkey => check_wepkey(value),
            Kind::Phonedigit => ensure(
                RE_PHONEDIGIT.is_match(value),
                "Must be a valid phone number digit",
            ),
            Kind::Range => {
                let (min, max) = match (self.num_arg(0), self.num_arg(1)) {
                    (Some(min), Some(max)) => (min, max),
                    _ => return Err("Must be a number between ? and ?".to_string()),
                };
                let ok = check_integer(value).is_ok()
                    && value
                        .parse::<f64>()
                        .is_ok_and(|v| v >= min && v <= max);
                ensure(
                    ok,
                    &format!(
                        "Must be a number between {} and {}",
                        fmt_num(min),
                        fmt_num(max)
                    ),
                )
            }
            Kind::Min => {
                let min = self.num_arg(0);
                let ok = min.is_some()
                    && check_integer(value).is_ok()
                    && value.parse::<f64>().is_ok_and(|v| v >= min.unwrap_or(0.0));
                ensure(
                    ok,
                    &format!(
                        "Must be a number greater or equal to {}",
                        min.map(fmt_num).unwrap_or_else(|| "?".into())
                    ),
                )
            }
            Kind::Max => {
                let max = self.num_arg(0);
                let ok = max.is_some()
                    && check_integer(value).is_ok()
                    && value.parse::<f64>().is_ok_and(|v| v <= max.unwrap_or(0.0));
                ensure(
                    ok,
                    &format!(
                        "Must be a number lower or equal to {}",
                        max.map(fmt_num).unwrap_or_else(|| "?".into())
                    ),
                )
            }
            Kind::Rangelength => {
                let (min, max) = match (self.num_arg(0), self.num_arg(1)) {
                    (Some(min), Some(max)) => (min, max),
                    _ => return Err("Must be between ? and ? characters".to_string()),
                };
                let len = value.chars().count() as f64;
                ensure(
                    len >= min && len <= max,
                    &format!(
                        "Must be between {} and {} characters",
                        fmt_num(min),
                        fmt_num(max)
                    ),
                )
            }
            Kind::Minlength => {
                let min = self.num_arg(0);
                let ok = min.is_some_and(|min| value.chars().count() as f64 >= min);
                ensure(
                    ok,
                    &format!(
                        "Must be at least {} characters",
                        min.map(fmt_num).unwrap_or_else(|| "?".into())
                    ),
                )
            }
            Kind::Maxlength => {
                let max = self.num_arg(0);
                let ok = max.is_some_and(|max| value.chars().count() as f64 <= max);
                ensure(
                    ok,
                    &format!(
                        "Must be at most {} characters",
                        max.map(fmt_num).unwrap_or_else(|| "?".into())
                    ),
                )
            }
            Kind::List => {
                let Some(Arg::Call(sub)) = self.args.first() else {
                    return Err("Must be a list of valid items".to_string());
                };
                for token in value.split([' ', '\t']).filter(|t| !t.is_empty()) {
                    sub.check(token)?;
                }
                Ok(())
            }
            Kind::Or => self.check_any(value),
            Kind::And => {
                for arg in &self.args {
                    match arg {
                        Arg::Call(call) => call.check(value)?,
                        literal => {
                            if !literal.matches(value) {
                                return Err(format!("Must be {}", literal.render()));
                            }
                        }
                    }
                }
                Ok(())
            }
            Kind::Neg => {
                let stripped = value
                    .trim_start_matches([' ', '\t'])
                    .strip_prefix('!')
                    .map(|rest| rest.trim_start_matches([' ', '\t']))
                    .unwrap_or(value);
                self.check_any(stripped)
            }
        }
    }

    /// Disjunction over the argument list: literal matches succeed
    /// immediately, validator calls contribute their failure message.
    fn check_any(&self, value: &str) -> Result<(), String> {
        let mut messages = Vec::new();
        for arg in &self.args {
            match arg {
                Arg::Call(call) => match call.check(value) {
                    Ok(()) => return Ok(()),
                    Err(msg) => messages.push(msg),
                },
                literal => {
                    if literal.matches(value) {
                        return Ok(());
                    }
                }
            }
        }
        if messages.is_empty() {
            Err("Must be one of the allowed values".to_string())
        } else {
            Err(messages.join(" - or - "))
        }
    }
}

fn ensure(ok: bool, message: &str) -> Result<(), String> {
    if ok { Ok(()) } else { Err(message.to_string()) }
}

fn check_integer(value: &str) -> Result<(), String> {
    ensure(RE_INTEGER.is_match(value), "Must be a valid integer")
}

fn check_float(value: &str) -> Result<(), String> {
    ensure(
        value.trim().parse::<f64>().is_ok(),
        "Must be a valid number",
    )
}

fn check_port(value: &str) -> Result<(), String> {
    let ok = RE_INTEGER.is_match(value) && value.parse::<i64>().is_ok_and(|n| (0..=65535).contains(&n));
    ensure(ok, "Must be a valid port number")
}

fn check_portrange(value: &str) -> Result<(), String> {
    if let Some(caps) = RE_PORTRANGE.captures(value) {
        let p1 = &caps[1];
        let p2 = &caps[2];
        if check_port(p1).is_ok()
            && check_port(p2).is_ok()
            && p1.parse::<i64>().unwrap_or(0) <= p2.parse::<i64>().unwrap_or(0)
        {
            return Ok(());
        }
    } else if check_port(value).is_ok() {
        return Ok(());
    }
    Err("Must be a valid port range".to_string())
}

fn check_ip4(value: &str) -> Result<(), String> {
    let fail = || "Must be a valid IPv4 address".to_string();
    let caps = RE_IP4.captures(value).ok_or_else(fail)?;
    for i in 1..=4 {
        let octet: u32 = caps[i].parse().map_err(|_| fail())?;
        if octet > 255 {
            return Err(fail());
        }
    }
    if let Some(suffix) = caps.get(6) {
        let suffix = suffix.as_str();
        if suffix.contains('.') {
            // Dotted netmask form, e.g. 192.168.0.0/255.255.255.0.
            check_ip4(suffix).map_err(|_| fail())?;
        } else {
            let bits: u32 = suffix.parse().map_err(|_| fail())?;
            if bits > 32 {
                return Err(fail());
            }
        }
    }
    Ok(())
}

fn check_ip6(value: &str) -> Result<(), String> {
    let fail = || "Must be a valid IPv6 address".to_string();
    let caps = RE_IP6_SHAPE.captures(value).ok_or_else(fail)?;
    if let Some(prefix) = caps.get(3) {
        let bits: u32 = prefix.as_str().parse().map_err(|_| fail())?;
        if bits > 128 {
            return Err(fail());
        }
    }

    let mut addr = caps[1].to_string();
    if addr == "::" {
        return Ok(());
    }

    // Fold a trailing v4-mapped quad into two hex groups.
    if addr.contains('.') {
        let off = addr.rfind(':').ok_or_else(fail)?;
        if off == 0 {
            return Err(fail());
        }
        check_ip4(&addr[off + 1..]).map_err(|_| fail())?;
        addr = format!("{}:0:0", &addr[..off]);
    }

    // Expand a `::` gap with the missing zero groups.
    if let Some(gap) = addr.find("::") {
        let inner = &addr[1..addr.len().saturating_sub(1)];
        let colons = inner.matches(':').count();
        if colons > 7 {
            return Err(fail());
        }
        let mut fill = String::from("0");
        for _ in 0..(7 - colons) {
            fill.push_str(":0");
        }
        let head = &addr[..gap];
        let tail = &addr[gap + 2..];
        addr = match (head.is_empty(), tail.is_empty()) {
            (true, true) => fill,
            (true, false) => format!("{fill}:{tail}"),
            (false, true) => format!("{head}:{fill}"),
            (false, false) => format!("{head}:{fill}:{tail}"),
        };
    }

    ensure(RE_IP6_FULL.is_match(&addr), &fail())
}

fn check_hostname(value: &str) -> Result<(), String> {
    let ok = value.len() <= 253
        && (RE_HOSTNAME_SIMPLE.is_match(value)
            || (RE_HOSTNAME_FULL.is_match(value)
                && value.chars().any(|c| !c.is_ascii_digit() && c != '.')));
    ensure(ok, "Must be a valid host name")
}

fn check_wpakey(value: &str) -> Result<(), String> {
    let ok = if value.len() == 64 {
        RE_HEX.is_match(value)
    } else {
        (8..=63).contains(&value.len())
    };
    ensure(ok, "Must be a valid WPA key")
}

fn check_wepkey(value: &str) -> Result<(), String> {
    let v = value.strip_prefix("s:").unwrap_or(value);
    let ok = if v.len() == 10 || v.len() == 26 {
        RE_HEX.is_match(v)
    } else {
        v.len() == 5 || v.len() == 13
    };
    ensure(ok, "Must be a valid WEP key")
}
