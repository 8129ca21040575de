//! Interface, neighbor, system and traffic workflows built on a [`Session`].

use crate::address::decode_ipv4_string;
use crate::correlate::{correlate, Column};
use crate::error::Error;
use crate::oid::OidPath;
use crate::rate::{Rate, RateSample, RateSampler};
use crate::record::{FieldValue, Record};
use crate::sink::Sink;
use crate::snmp::{Session, SnmpValue};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// IF-MIB ifTable columns
const IF_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
const IF_SPEED: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 5];
const IF_OPER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];
const IF_IN_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 10];
const IF_OUT_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 16];

// IF-MIB ifXTable 64-bit counters
const IF_HC_IN_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6];
const IF_HC_OUT_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10];

/// ipNetToMediaPhysAddress.<ifIndex>.<a>.<b>.<c>.<d>
const IP_NET_TO_MEDIA_PHYS_ADDRESS: &[u32] = &[1, 3, 6, 1, 2, 1, 4, 22, 1, 2];

const SYS_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];
const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
const SYS_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];

/// IF-MIB ifOperStatus names
pub fn oper_status_name(status: i64) -> Option<&'static str> {
    match status {
        1 => Some("up"),
        2 => Some("down"),
        3 => Some("testing"),
        4 => Some("unknown"),
        5 => Some("dormant"),
        6 => Some("notPresent"),
        7 => Some("lowerLayerDown"),
        _ => None,
    }
}

/// Interface inventory: index, description, status, speed.
pub async fn interfaces(session: &Session) -> Vec<Record> {
    tracing::info!("Discovering interfaces on {}", session.target());

    let descr = session.walk(&OidPath::from(IF_DESCR)).await;
    let status = session.walk(&OidPath::from(IF_OPER_STATUS)).await;
    let speed = session.walk(&OidPath::from(IF_SPEED)).await;

    let mut records = correlate(&[
        Column::new("description", &descr),
        Column::new("status", &status),
        Column::new("speed", &speed),
    ]);

    for record in &mut records {
        let name = match record.get("status") {
            Some(FieldValue::Integer(code)) => oper_status_name(*code),
            _ => None,
        };
        if let Some(name) = name {
            record.set("status", name);
        }
    }

    tracing::info!("Found {} interfaces on {}", records.len(), session.target());
    records
}

/// IP-layer neighbors from the ARP table.
///
/// Rows whose index does not decode to an IPv4 address are skipped.
pub async fn neighbors(session: &Session) -> Vec<Record> {
    tracing::info!("Discovering IP neighbors on {}", session.target());

    let root = OidPath::from(IP_NET_TO_MEDIA_PHYS_ADDRESS);
    let entries = session.walk(&root).await;

    let mut records = Vec::with_capacity(entries.len());
    for binding in &entries {
        let ip_address = match decode_ipv4_string(&binding.oid) {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!("Skipping neighbor entry on {}: {}", session.target(), e);
                continue;
            }
        };

        let mut record = Record::new()
            .with("ip_address", ip_address)
            .with("mac_address", format_mac(&binding.value));

        // ifIndex sits just before the four address sub-identifiers
        let if_index = binding
            .oid
            .suffix(5)
            .filter(|_| binding.oid.len() >= root.len() + 5)
            .map(|suffix| FieldValue::from(suffix[0]))
            .unwrap_or(FieldValue::Missing);
        record.set("if_index", if_index);

        records.push(record);
    }

    tracing::info!("Found {} neighbors on {}", records.len(), session.target());
    records
}

/// Colon-separated hex for a physical address, plain text otherwise.
fn format_mac(value: &SnmpValue) -> FieldValue {
    match value {
        SnmpValue::OctetString(bytes) if !bytes.is_empty() => FieldValue::Text(
            bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        other => FieldValue::from(other.clone()),
    }
}

/// sysDescr, sysName and sysUpTime. A failed GET leaves its field missing.
pub async fn system_info(session: &Session) -> Record {
    let mut record = Record::new().with("target", session.target());

    for (name, oid) in [
        ("name", SYS_NAME),
        ("description", SYS_DESCR),
        ("uptime_ticks", SYS_UPTIME),
    ] {
        let value = match session.get(&OidPath::from(oid)).await {
            Ok(binding) => FieldValue::from(binding.value),
            Err(e) => {
                tracing::warn!("GET {} on {} failed: {}", name, session.target(), e);
                FieldValue::Missing
            }
        };
        record.set(name, value);
    }

    record
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficOptions {
    pub interval: Duration,
    pub iterations: u32,
    /// Use the 64-bit ifXTable counters
    pub high_capacity: bool,
}

impl Default for TrafficOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            iterations: 1,
            high_capacity: false,
        }
    }
}

impl From<Rate> for FieldValue {
    fn from(rate: Rate) -> Self {
        match rate {
            Rate::BitsPerSecond(bps) => FieldValue::Float(bps),
            Rate::CounterReset => FieldValue::CounterReset,
        }
    }
}

/// Sample interface traffic `options.iterations` times, emitting one batch of
/// records per iteration. Returns the number of records emitted.
pub async fn monitor_traffic(
    session: &Session,
    options: &TrafficOptions,
    cancel: &CancellationToken,
    sink: &mut dyn Sink,
) -> Result<usize, Error> {
    let (in_root, out_root) = if options.high_capacity {
        (IF_HC_IN_OCTETS, IF_HC_OUT_OCTETS)
    } else {
        (IF_IN_OCTETS, IF_OUT_OCTETS)
    };
    let roots = [OidPath::from(in_root), OidPath::from(out_root)];

    tracing::info!(
        "Monitoring traffic on {} every {:?} ({} iterations)",
        session.target(),
        options.interval,
        options.iterations
    );

    let descr = session.walk(&OidPath::from(IF_DESCR)).await;
    let mut names: HashMap<u32, String> = HashMap::with_capacity(descr.len());
    for binding in &descr {
        if let Some(index) = binding.oid.table_index() {
            names.entry(index).or_insert_with(|| binding.value.to_string());
        }
    }

    let sampler = RateSampler::new(options.interval);
    let mut emitted = 0;

    for iteration in 1..=options.iterations {
        let mut rates = sampler.sample(session, &roots, cancel).await?.into_iter();
        let in_rates = rates.next().unwrap_or_default();
        let out_rates = rates.next().unwrap_or_default();
        if in_rates.is_empty() != out_rates.is_empty() {
            tracing::warn!(
                "Traffic iteration {} on {}: no {} rates, reporting that direction as missing",
                iteration,
                session.target(),
                if in_rates.is_empty() { "inbound" } else { "outbound" }
            );
        }

        let records = traffic_records(&in_rates, &out_rates, &names);
        tracing::debug!(
            "Traffic iteration {} on {}: {} interfaces",
            iteration,
            session.target(),
            records.len()
        );

        sink.emit(&records);
        emitted += records.len();
    }

    Ok(emitted)
}

/// One record per index seen in either direction, inbound order first. A
/// direction without a rate for the index is left missing.
fn traffic_records(
    in_rates: &[RateSample],
    out_rates: &[RateSample],
    names: &HashMap<u32, String>,
) -> Vec<Record> {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let in_by_index: HashMap<u32, Rate> = in_rates.iter().map(|s| (s.index, s.rate)).collect();
    let out_by_index: HashMap<u32, Rate> =
        out_rates.iter().map(|s| (s.index, s.rate)).collect();

    let mut seen = HashSet::new();
    let indexes: Vec<u32> = in_rates
        .iter()
        .chain(out_rates)
        .map(|s| s.index)
        .filter(|index| seen.insert(*index))
        .collect();

    let rate_field = |rates: &HashMap<u32, Rate>, index: u32| {
        rates
            .get(&index)
            .map(|rate| FieldValue::from(*rate))
            .unwrap_or(FieldValue::Missing)
    };

    indexes
        .into_iter()
        .map(|index| {
            let interface = names
                .get(&index)
                .map(|name| FieldValue::Text(name.clone()))
                .unwrap_or(FieldValue::Missing);

            Record::with_index(index)
                .with("interface", interface)
                .with("in_bps", rate_field(&in_by_index, index))
                .with("out_bps", rate_field(&out_by_index, index))
                .with("timestamp", timestamp.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnmpResult;
    use crate::snmp::testing::{reply, ScriptedTransport};
    use crate::snmp::{QueryEngine, Response};

    fn session(script: Vec<SnmpResult<Response>>) -> Session {
        let engine = QueryEngine::new(ScriptedTransport::new(script), 0);
        Session::spawn("test-device:161".to_string(), engine).unwrap()
    }

    fn text(s: &str) -> SnmpValue {
        SnmpValue::OctetString(s.as_bytes().to_vec())
    }

    fn end(oid: &str) -> SnmpResult<Response> {
        reply(oid, SnmpValue::EndOfMibView)
    }

    #[test]
    fn test_oper_status_names() {
        assert_eq!(oper_status_name(1), Some("up"));
        assert_eq!(oper_status_name(7), Some("lowerLayerDown"));
        assert_eq!(oper_status_name(0), None);
    }

    #[tokio::test]
    async fn test_interfaces_correlates_by_index() {
        let session = session(vec![
            // ifDescr
            reply("1.3.6.1.2.1.2.2.1.2.1", text("lo")),
            reply("1.3.6.1.2.1.2.2.1.2.2", text("eth0")),
            reply("1.3.6.1.2.1.2.2.1.3.1", SnmpValue::Integer(24)),
            // ifOperStatus, row 1 absent
            reply("1.3.6.1.2.1.2.2.1.8.2", SnmpValue::Integer(2)),
            reply("1.3.6.1.2.1.2.2.1.9.1", SnmpValue::TimeTicks(0)),
            // ifSpeed
            reply("1.3.6.1.2.1.2.2.1.5.1", SnmpValue::Gauge32(10_000_000)),
            reply("1.3.6.1.2.1.2.2.1.5.2", SnmpValue::Gauge32(1_000_000_000)),
            reply("1.3.6.1.2.1.2.2.1.6.1", text("")),
        ]);

        let records = interfaces(&session).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("status"), Some(&FieldValue::Missing));
        assert_eq!(records[1].get("description"), Some(&FieldValue::Text("eth0".into())));
        assert_eq!(records[1].get("status"), Some(&FieldValue::Text("down".into())));
        assert_eq!(
            records[1].get("speed"),
            Some(&FieldValue::Unsigned(1_000_000_000))
        );
    }

    #[tokio::test]
    async fn test_neighbors_decode_address_and_mac() {
        let session = session(vec![
            reply(
                "1.3.6.1.2.1.4.22.1.2.2.10.0.0.1",
                SnmpValue::OctetString(vec![0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]),
            ),
            // Not an IPv4 address, skipped
            reply(
                "1.3.6.1.2.1.4.22.1.2.2.10.0.300.1",
                SnmpValue::OctetString(vec![0xff; 6]),
            ),
            end("1.3.6.1.2.1.4.22.1.3.2.10.0.0.1"),
        ]);

        let records = neighbors(&session).await;

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("ip_address"),
            Some(&FieldValue::Text("10.0.0.1".into()))
        );
        assert_eq!(
            records[0].get("mac_address"),
            Some(&FieldValue::Text("00:1a:2b:3c:4d:5e".into()))
        );
        assert_eq!(records[0].get("if_index"), Some(&FieldValue::Unsigned(2)));
    }

    #[tokio::test]
    async fn test_system_info_marks_failed_get_missing() {
        let session = session(vec![
            reply("1.3.6.1.2.1.1.5.0", text("core-sw1")),
            Ok(Response {
                error_status: 2,
                error_index: 1,
                bindings: Vec::new(),
            }),
            reply("1.3.6.1.2.1.1.3.0", SnmpValue::TimeTicks(123_456)),
        ]);

        let record = system_info(&session).await;

        assert_eq!(record.get("name"), Some(&FieldValue::Text("core-sw1".into())));
        assert_eq!(record.get("description"), Some(&FieldValue::Missing));
        assert_eq!(record.get("uptime_ticks"), Some(&FieldValue::Unsigned(123_456)));
    }

    #[tokio::test]
    async fn test_monitor_traffic_emits_per_iteration() {
        let mut script = vec![
            reply("1.3.6.1.2.1.2.2.1.2.1", text("eth0")),
            end("1.3.6.1.2.1.2.2.1.3.1"),
        ];
        // (in, out) per walk: before/after for two iterations
        for (in_octets, out_octets) in [(0, 0), (1_000, 500), (5_000, 500), (10, 600)] {
            script.push(reply("1.3.6.1.2.1.2.2.1.10.1", SnmpValue::Counter32(in_octets)));
            script.push(end("1.3.6.1.2.1.2.2.1.11.1"));
            script.push(reply("1.3.6.1.2.1.2.2.1.16.1", SnmpValue::Counter32(out_octets)));
            script.push(end("1.3.6.1.2.1.2.2.1.17.1"));
        }
        let session = session(script);
        let options = TrafficOptions {
            interval: Duration::from_millis(10),
            iterations: 2,
            high_capacity: false,
        };
        let mut sink: Vec<Record> = Vec::new();

        let emitted = monitor_traffic(&session, &options, &CancellationToken::new(), &mut sink)
            .await
            .unwrap();

        assert_eq!(emitted, 2);
        let first = &sink[0];
        assert_eq!(first.get("interface"), Some(&FieldValue::Text("eth0".into())));
        assert!(matches!(first.get("in_bps"), Some(FieldValue::Float(bps)) if *bps > 0.0));
        assert!(first.get("timestamp").is_some());
        // Second iteration: in counter dropped from 5000 to 10
        assert_eq!(sink[1].get("in_bps"), Some(&FieldValue::CounterReset));
    }

    #[test]
    fn test_traffic_records_keep_rows_from_either_direction() {
        let names = HashMap::from([(1, "eth0".to_string()), (2, "eth1".to_string())]);
        let out_rates = vec![
            RateSample {
                index: 1,
                rate: Rate::BitsPerSecond(800.0),
            },
            RateSample {
                index: 2,
                rate: Rate::CounterReset,
            },
        ];

        // Inbound walk failed
        let records = traffic_records(&[], &out_rates, &names);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("in_bps"), Some(&FieldValue::Missing));
        assert_eq!(records[0].get("out_bps"), Some(&FieldValue::Float(800.0)));
        assert_eq!(records[1].get("interface"), Some(&FieldValue::Text("eth1".into())));
        assert_eq!(records[1].get("out_bps"), Some(&FieldValue::CounterReset));
    }

    #[test]
    fn test_traffic_records_merge_directions_by_index() {
        let in_rates = vec![RateSample {
            index: 3,
            rate: Rate::BitsPerSecond(16.0),
        }];
        let out_rates = vec![
            RateSample {
                index: 5,
                rate: Rate::BitsPerSecond(8.0),
            },
            RateSample {
                index: 3,
                rate: Rate::BitsPerSecond(24.0),
            },
        ];

        let records = traffic_records(&in_rates, &out_rates, &HashMap::new());

        let indexes: Vec<Option<u32>> = records.iter().map(|r| r.index()).collect();
        assert_eq!(indexes, vec![Some(3), Some(5)]);
        assert_eq!(records[0].get("out_bps"), Some(&FieldValue::Float(24.0)));
        assert_eq!(records[1].get("in_bps"), Some(&FieldValue::Missing));
        assert_eq!(records[1].get("interface"), Some(&FieldValue::Missing));
    }

    #[tokio::test]
    async fn test_monitor_traffic_cancelled() {
        let session = session(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink: Vec<Record> = Vec::new();

        let result = monitor_traffic(&session, &TrafficOptions::default(), &cancel, &mut sink).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(sink.is_empty());
    }
}
