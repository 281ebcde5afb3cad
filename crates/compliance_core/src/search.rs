//! Entitlement search filters.

use compliance_types::{EntitlementFilter, EntitlementView};
use rust_decimal::Decimal;

/// Case-insensitive substring match; an empty needle matches everything.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn flag_matches(wanted: Option<bool>, actual: bool) -> bool {
    wanted.map_or(true, |w| w == actual)
}

/// Available count of a search row. Rows without an allocation (part not in
/// the catalog) report their full count.
pub fn available_of(view: &EntitlementView) -> Decimal {
    view.allocation
        .as_ref()
        .map_or(view.entitlement.count, |a| a.available)
}

pub fn matches(filter: &EntitlementFilter, view: &EntitlementView) -> bool {
    let e = &view.entitlement;
    if !(contains_ci(&e.agreement_id, &filter.agreement_id)
        && contains_ci(&e.part_id, &filter.part_id)
        && contains_ci(&view.item_description, &filter.item_description)
        && contains_ci(&e.csi, &filter.csi)
        && contains_ci(&e.reference_number, &filter.reference_number))
    {
        return false;
    }
    if filter.metric.is_some() && filter.metric != view.metric {
        return false;
    }
    if !flag_matches(filter.unlimited, e.unlimited) || !flag_matches(filter.catch_all, e.catch_all)
    {
        return false;
    }
    let available = available_of(view);
    if filter.available_count_gte.is_some_and(|min| available < min) {
        return false;
    }
    if filter.available_count_lte.is_some_and(|max| available > max) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use compliance_types::{Entitlement, EntitlementAllocation, Metric};

    use super::*;

    fn view(available: i64) -> EntitlementView {
        let mut e = Entitlement::new("AG-100200", "A90611", Decimal::from(10));
        e.csi = "CSI-77".into();
        EntitlementView {
            allocation: Some(EntitlementAllocation {
                entitlement_id: e.id,
                agreement_id: e.agreement_id.clone(),
                count: e.count,
                unlimited: false,
                catch_all: false,
                covered: Decimal::from(10 - available),
                available: Decimal::from(available),
                hosts: Vec::new(),
            }),
            entitlement: e,
            version: 1,
            item_description: "Oracle Database Enterprise Edition".into(),
            metric: Some(Metric::Processor),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&EntitlementFilter::default(), &view(3)));
    }

    #[test]
    fn text_fields_are_case_insensitive_substrings() {
        let filter = EntitlementFilter {
            item_description: "enterprise".into(),
            csi: "csi-7".into(),
            ..Default::default()
        };
        assert!(matches(&filter, &view(3)));

        let filter = EntitlementFilter {
            agreement_id: "999".into(),
            ..Default::default()
        };
        assert!(!matches(&filter, &view(3)));
    }

    #[test]
    fn metric_and_flags_match_exactly() {
        let filter = EntitlementFilter {
            metric: Some(Metric::NamedUser),
            ..Default::default()
        };
        assert!(!matches(&filter, &view(3)));

        let filter = EntitlementFilter {
            catch_all: Some(false),
            unlimited: Some(false),
            ..Default::default()
        };
        assert!(matches(&filter, &view(3)));

        let filter = EntitlementFilter {
            unlimited: Some(true),
            ..Default::default()
        };
        assert!(!matches(&filter, &view(3)));
    }

    #[test]
    fn available_bounds_are_inclusive() {
        let filter = EntitlementFilter {
            available_count_gte: Some(Decimal::from(3)),
            available_count_lte: Some(Decimal::from(3)),
            ..Default::default()
        };
        assert!(matches(&filter, &view(3)));
        assert!(!matches(&filter, &view(-1)));
    }

    #[test]
    fn rows_without_allocation_use_count() {
        let mut row = view(0);
        row.allocation = None;
        assert_eq!(available_of(&row), Decimal::from(10));
    }
}
