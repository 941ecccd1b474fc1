//! Display-time text transforms.

use once_cell::sync::Lazy;
use regex::Regex;

static TIME_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"T([0-9]{2}:[0-9]{2}:[0-9]{2})\.[0-9]{3}$").unwrap());

/// Rewrite an ISO-8601 timestamp with a trailing fractional-seconds pattern
/// into its space-separated form: `2020-01-01T00:00:00.000` becomes
/// `2020-01-01 00:00:00`. Values not matching the pattern pass through
/// unchanged.
pub fn dhis_date(value: &str) -> String {
    TIME_SUFFIX.replace(value, " $1").into_owned()
}

/// Short display label for a FactsInfo header name. Unknown headers keep
/// their original label.
pub fn short_header_label(header: &str) -> &str {
    match header {
        "OperatingUnit" => "OU",
        "FiscalYear" => "FY",
        "PlanningReportingCycle" => "Reporting Cycle",
        "HQMechanismID" => "HQ ID",
        "LegacyMechanismID" => "Legacy ID",
        "ImplementingMechanismName" => "IM",
        "FundingAgency" => "Funding Agency",
        "PrimePartner" => "Prime Partner",
        "PrimePartnerID" => "Partner ID",
        "StartDate" => "Start Date",
        "EndDate" => "End Date",
        other => other,
    }
}
