//! Ticket number formatting (`PREFIX-YYYYMMDD-SEQ`).

use chrono::NaiveDate;

use super::ServiceType;

/// Compose a ticket number from its parts.
///
/// SEQ is zero-padded to three digits and grows wider past 999.
pub fn compose(service_type: ServiceType, date: NaiveDate, queue_number: u32) -> String {
    format!(
        "{}-{}-{:03}",
        service_type.prefix(),
        date.format("%Y%m%d"),
        queue_number
    )
}

/// Parts of a well-formed ticket number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketNumberParts {
    pub service_type: ServiceType,
    pub date: NaiveDate,
    pub queue_number: u32,
}

/// Parse a ticket number. Returns `None` if it is not well-formed.
pub fn parse(ticket_number: &str) -> Option<TicketNumberParts> {
    let mut parts = ticket_number.splitn(3, '-');
    let service_type = ServiceType::from_prefix(parts.next()?)?;

    let date_part = parts.next()?;
    if date_part.len() != 8 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()?;

    let seq = parts.next()?;
    if seq.len() < 3 || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let queue_number: u32 = seq.parse().ok()?;
    if queue_number == 0 {
        return None;
    }

    Some(TicketNumberParts {
        service_type,
        date,
        queue_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_compose_pads_sequence() {
        assert_eq!(
            compose(ServiceType::KonsultasiStatistik, date(2026, 3, 10), 1),
            "KS-20260310-001"
        );
        assert_eq!(
            compose(ServiceType::PenjualanDataMikro, date(2026, 3, 10), 42),
            "DM-20260310-042"
        );
    }

    #[test]
    fn test_compose_wider_than_three_digits() {
        assert_eq!(
            compose(ServiceType::PerpustakaanStatistik, date(2026, 1, 2), 1234),
            "PS-20260102-1234"
        );
    }

    #[test]
    fn test_parse_valid() {
        let parts = parse("RK-20261231-007").unwrap();
        assert_eq!(parts.service_type, ServiceType::RekomendasiKegiatanStatistik);
        assert_eq!(parts.date, date(2026, 12, 31));
        assert_eq!(parts.queue_number, 7);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("").is_none());
        assert!(parse("XX-20260310-001").is_none());
        assert!(parse("KS-2026031-001").is_none());
        assert!(parse("KS-20261310-001").is_none());
        assert!(parse("KS-20260310-01").is_none());
        assert!(parse("KS-20260310-000").is_none());
        assert!(parse("KS-20260310-0a1").is_none());
    }

    #[test]
    fn test_parse_inverts_compose() {
        let number = compose(ServiceType::PenjualanDataMikro, date(2026, 3, 10), 2);
        let parts = parse(&number).unwrap();
        assert_eq!(parts.service_type, ServiceType::PenjualanDataMikro);
        assert_eq!(parts.queue_number, 2);
    }
}
