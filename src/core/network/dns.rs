// src/core/network/dns.rs

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::lookup::Lookup;
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::dnssec::rdata::DNSSECRData;
use hickory_resolver::proto::rr::{RData, RecordType as WireType};
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{DnsError, RecordType};
use crate::core::models::{DnskeyInfo, DsInfo};

const FLAG_ZONE_KEY: u16 = 0x0100;
const FLAG_REVOKE: u16 = 0x0080;
const FLAG_SECURE_ENTRY_POINT: u16 = 0x0001;

/// Two resolvers over the system-independent default upstreams: a plain one
/// for record lookups, and one that validates DNSSEC signatures.
pub struct DnsClient {
    plain: TokioAsyncResolver,
    validating: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsClient {
    pub fn new(query_timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = query_timeout;

        let mut validating_opts = opts.clone();
        validating_opts.validate = true;

        Self {
            plain: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
            validating: TokioAsyncResolver::tokio(ResolverConfig::default(), validating_opts),
            timeout: query_timeout,
        }
    }

    pub async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        let wire_type = wire_type(record_type);
        let lookup = self.query(&self.plain, name, wire_type, false).await?;
        let values: Vec<String> = answers(&lookup, wire_type).map(render_rdata).collect();
        if values.is_empty() {
            return Err(DnsError::NoRecord { name: name.to_string(), record_type: record_type.to_string() });
        }
        Ok(values)
    }

    pub async fn dnskey(&self, name: &str) -> Result<Vec<DnskeyInfo>, DnsError> {
        let lookup = self.query(&self.plain, name, WireType::DNSKEY, false).await?;
        let keys = answers(&lookup, WireType::DNSKEY)
            .filter_map(|rdata| match rdata {
                RData::DNSSEC(DNSSECRData::DNSKEY(key)) => {
                    let mut flags = 0;
                    if key.zone_key() {
                        flags |= FLAG_ZONE_KEY;
                    }
                    if key.revoke() {
                        flags |= FLAG_REVOKE;
                    }
                    if key.secure_entry_point() {
                        flags |= FLAG_SECURE_ENTRY_POINT;
                    }
                    let key_tag = key.calculate_key_tag().unwrap_or_else(|e| {
                        warn!(name, error = %e, "Could not compute DNSKEY key tag.");
                        0
                    });
                    Some(DnskeyInfo { key_tag, algorithm: u8::from(key.algorithm()), flags })
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return Err(DnsError::NoRecord { name: name.to_string(), record_type: "DNSKEY".to_string() });
        }
        Ok(keys)
    }

    pub async fn ds(&self, name: &str) -> Result<Vec<DsInfo>, DnsError> {
        let lookup = self.query(&self.plain, name, WireType::DS, false).await?;
        let records = answers(&lookup, WireType::DS)
            .filter_map(|rdata| match rdata {
                RData::DNSSEC(DNSSECRData::DS(ds)) => Some(DsInfo {
                    key_tag: ds.key_tag(),
                    algorithm: u8::from(ds.algorithm()),
                    digest_type: u8::from(ds.digest_type()),
                }),
                _ => None,
            })
            .collect::<Vec<_>>();
        if records.is_empty() {
            return Err(DnsError::NoRecord { name: name.to_string(), record_type: "DS".to_string() });
        }
        Ok(records)
    }

    pub async fn validated_lookup(&self, name: &str) -> Result<Vec<String>, DnsError> {
        let lookup = self.query(&self.validating, name, WireType::A, true).await?;
        Ok(answers(&lookup, WireType::A).map(render_rdata).collect())
    }

    async fn query(
        &self,
        resolver: &TokioAsyncResolver,
        name: &str,
        wire_type: WireType,
        validating: bool,
    ) -> Result<Lookup, DnsError> {
        debug!(name, record_type = %wire_type, "Querying resolver.");
        match timeout(self.timeout, resolver.lookup(name, wire_type)).await {
            Ok(Ok(lookup)) => Ok(lookup),
            Ok(Err(e)) => Err(classify(name, wire_type, validating, &e)),
            Err(_) => {
                warn!(name, record_type = %wire_type, "DNS query timed out.");
                Err(DnsError::Resolution(format!("query for {name} timed out after {:?}", self.timeout)))
            }
        }
    }
}

fn wire_type(record_type: RecordType) -> WireType {
    match record_type {
        RecordType::A => WireType::A,
        RecordType::Aaaa => WireType::AAAA,
        RecordType::Mx => WireType::MX,
        RecordType::Txt => WireType::TXT,
    }
}

// CNAME chain members are part of the answer section; only keep the asked-for type.
fn answers(lookup: &Lookup, wire_type: WireType) -> impl Iterator<Item = &RData> {
    lookup
        .record_iter()
        .filter(move |record| record.record_type() == wire_type)
        .filter_map(|record| record.data())
}

fn render_rdata(rdata: &RData) -> String {
    match rdata {
        RData::A(a) => a.to_string(),
        RData::AAAA(aaaa) => aaaa.to_string(),
        RData::MX(mx) => mx.exchange().to_utf8().trim_end_matches('.').to_string(),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|part| String::from_utf8_lossy(part))
            .collect::<String>(),
        other => other.to_string(),
    }
}

fn classify(name: &str, wire_type: WireType, validating: bool, error: &ResolveError) -> DnsError {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } if *response_code == ResponseCode::NXDomain => {
            DnsError::NameNotFound(name.to_string())
        }
        ResolveErrorKind::NoRecordsFound { .. } => {
            DnsError::NoRecord { name: name.to_string(), record_type: wire_type.to_string() }
        }
        ResolveErrorKind::Proto(proto) if validating && is_dnssec_failure(proto.kind()) => {
            debug!(name, record_type = %wire_type, error = %error, "DNSSEC chain rejected.");
            DnsError::Validation(error.to_string())
        }
        _ => {
            warn!(name, record_type = %wire_type, error = %error, "DNS query failed.");
            DnsError::Resolution(error.to_string())
        }
    }
}

/// Errors the DNSSEC verifier raises for a broken or missing signature chain.
/// Transport failures (I/O, timeouts, busy upstreams) are not among them.
fn is_dnssec_failure(kind: &ProtoErrorKind) -> bool {
    matches!(
        kind,
        ProtoErrorKind::RrsigsNotPresent { .. } | ProtoErrorKind::Message(_) | ProtoErrorKind::Msg(_)
    )
}
