//! Scope and ROI documents: the deterministic maths, the template values handed to the
//! language model, and the canned versions served when no model is configured.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::api::ScopeRequest;

pub const SCOPE_TEMPLATE: &str = "scope_request";
pub const ROI_TEMPLATE: &str = "roi_request";

const WEEKS_PER_YEAR: f64 = 52.0;
const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiEstimate {
    pub employees: f64,
    pub hours_saved_per_week: f64,
    pub hourly_rate: f64,
    pub implementation_cost: f64,
    pub annual_hours: f64,
    pub annual_savings: f64,
    /// `None` when there is no implementation cost to return on.
    pub roi_percent: Option<f64>,
    /// `None` when nothing is saved, so the cost is never paid back.
    pub payback_months: Option<f64>,
}

pub fn compute_roi(
    employees: f64,
    hours_saved_per_week: f64,
    hourly_rate: f64,
    implementation_cost: f64
) -> RoiEstimate {
    let annual_hours = employees * hours_saved_per_week * WEEKS_PER_YEAR;
    let annual_savings = annual_hours * hourly_rate;

    let roi_percent = (implementation_cost > 0.0).then(|| {
        round_to((annual_savings - implementation_cost) / implementation_cost * 100.0, 1)
    });
    let payback_months = (annual_savings > 0.0).then(|| {
        round_to(implementation_cost / (annual_savings / 12.0), 1)
    });

    RoiEstimate {
        employees,
        hours_saved_per_week,
        hourly_rate,
        implementation_cost,
        annual_hours: round_to(annual_hours, 1),
        annual_savings: round_to(annual_savings, 2),
        roi_percent,
        payback_months,
    }
}

impl RoiEstimate {
    pub fn template_values(&self) -> HashMap<String, String> {
        HashMap::from([
            ("employees".to_string(), format_number(self.employees)),
            ("hours_saved_per_week".to_string(), format_number(self.hours_saved_per_week)),
            ("annual_hours".to_string(), format_number(self.annual_hours)),
            ("annual_savings".to_string(), format_money(self.annual_savings)),
            ("implementation_cost".to_string(), format_money(self.implementation_cost)),
            ("roi_percent".to_string(), self.roi_label()),
            ("payback_months".to_string(), self.payback_label()),
        ])
    }

    fn roi_label(&self) -> String {
        match self.roi_percent {
            Some(pct) => format!("{}%", format_number(pct)),
            None => "n/a (no implementation cost)".to_string(),
        }
    }

    fn payback_label(&self) -> String {
        match self.payback_months {
            Some(months) => format!("{} months", format_number(months)),
            None => "never (no savings)".to_string(),
        }
    }
}

/// Plain-language summary used when no model is available to write one.
pub fn canned_roi_summary(estimate: &RoiEstimate) -> String {
    let mut summary = format!(
        "Automating this work for {} employees saves about {} hours a year, worth roughly ${}.",
        format_number(estimate.employees),
        format_number(estimate.annual_hours),
        format_money(estimate.annual_savings)
    );
    match (estimate.roi_percent, estimate.payback_months) {
        (Some(_), Some(_)) => {
            summary.push_str(
                &format!(
                    " Against an implementation cost of ${}, that is a first-year ROI of {} with payback in {}.",
                    format_money(estimate.implementation_cost),
                    estimate.roi_label(),
                    estimate.payback_label()
                )
            );
        }
        (None, _) => {
            summary.push_str(" With no implementation cost entered, the savings are all upside.");
        }
        (Some(_), None) => {
            summary.push_str(" With no time saved, the implementation cost would not be recovered.");
        }
    }
    summary.push_str(" Book a discovery call and we'll pressure-test these numbers with you.");
    summary
}

pub fn scope_values(req: &ScopeRequest, goals: &str) -> HashMap<String, String> {
    let field = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_SPECIFIED)
            .to_string()
    };
    let mut values = HashMap::from([
        ("industry".to_string(), field(&req.industry)),
        ("goals".to_string(), goals.to_string()),
        ("budget".to_string(), field(&req.budget)),
        ("timeline".to_string(), field(&req.timeline)),
    ]);
    // Only override the site's own `{company}` when the visitor named theirs.
    if let Some(company) = req.company.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        values.insert("company".to_string(), company.to_string());
    }
    values
}

/// Markdown scope document with the visitor's answers slotted into a fixed outline.
pub fn canned_scope(req: &ScopeRequest, goals: &str) -> String {
    let values = scope_values(req, goals);
    let get = |key: &str| values.get(key).map(String::as_str).unwrap_or(NOT_SPECIFIED);
    let company = get("company");
    let company = if company == NOT_SPECIFIED { "Your business" } else { company };

    format!(
        "# Project Scope: {company}\n\n\
         ## Overview\n\
         {company} ({industry}) wants to use automation to: {goals}\n\n\
         ## Objectives\n\
         - Remove repetitive manual work from the team's week\n\
         - Measure time saved from the first month\n\n\
         ## Proposed Solution\n\
         A phased rollout starting with the highest-volume workflow, integrated with the tools \
         you already use.\n\n\
         ## Phases\n\
         1. Discovery and process mapping\n\
         2. Pilot automation on one workflow\n\
         3. Rollout and team training\n\n\
         ## Timeline\n\
         {timeline}\n\n\
         ## Investment\n\
         {budget}\n\n\
         ## Next Steps\n\
         Book a discovery call and we'll turn this outline into a detailed proposal.\n",
        company = company,
        industry = get("industry"),
        goals = get("goals"),
        timeline = get("timeline"),
        budget = get("budget")
    )
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = (10f64).powi(places);
    (value * factor).round() / factor
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 { format!("{}", value as i64) } else { format!("{}", value) }
}

fn format_money(value: f64) -> String {
    if value.fract() == 0.0 { format!("{}", value as i64) } else { format!("{:.2}", value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_follows_the_formulas() {
        let est = compute_roi(5.0, 4.0, 50.0, 20_000.0);
        assert_eq!(est.annual_hours, 1040.0);
        assert_eq!(est.annual_savings, 52_000.0);
        assert_eq!(est.roi_percent, Some(160.0));
        // 20000 / (52000 / 12) = 4.615...
        assert_eq!(est.payback_months, Some(4.6));
    }

    #[test]
    fn zero_cost_has_no_roi_percentage() {
        let est = compute_roi(2.0, 1.0, 30.0, 0.0);
        assert_eq!(est.roi_percent, None);
        assert_eq!(est.payback_months, Some(0.0));
    }

    #[test]
    fn zero_savings_never_pays_back() {
        let est = compute_roi(0.0, 10.0, 30.0, 5_000.0);
        assert_eq!(est.payback_months, None);
        assert_eq!(est.roi_percent, Some(-100.0));
        assert!(canned_roi_summary(&est).contains("would not be recovered"));
    }

    #[test]
    fn template_values_are_formatted() {
        let values = compute_roi(5.0, 4.0, 50.0, 20_000.0).template_values();
        assert_eq!(values["annual_savings"], "52000");
        assert_eq!(values["roi_percent"], "160%");
        assert_eq!(values["payback_months"], "4.6 months");
    }

    #[test]
    fn canned_summary_quotes_the_figures() {
        let summary = canned_roi_summary(&compute_roi(5.0, 4.0, 50.0, 20_000.0));
        assert!(summary.contains("1040 hours"));
        assert!(summary.contains("$52000"));
        assert!(summary.contains("160%"));
    }

    #[test]
    fn scope_fills_missing_fields() {
        let req = ScopeRequest { industry: Some("Logistics".into()), ..Default::default() };
        let doc = canned_scope(&req, "Automate dispatch emails");
        assert!(doc.starts_with("# Project Scope: Your business"));
        assert!(doc.contains("(Logistics)"));
        assert!(doc.contains("Automate dispatch emails"));
        assert!(doc.contains("## Timeline\nNot specified"));
    }

    #[test]
    fn scope_values_keep_site_company_unless_given() {
        let values = scope_values(&ScopeRequest::default(), "x");
        assert!(!values.contains_key("company"));
        let req = ScopeRequest { company: Some("Acme".into()), ..Default::default() };
        assert_eq!(scope_values(&req, "x")["company"], "Acme");
    }
}
