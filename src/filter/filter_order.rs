use super::error::FilterError;
use super::filter_where::{qualified, validate_identifier, MAIN_ALIAS};
use super::types::{FilterOrderInfo, SortDirection};
use crate::resource::ResourceDescriptor;

pub struct FilterOrder;

impl FilterOrder {
    /// Requested terms, or the resource default when none were given, with the
    /// primary key appended ascending so the order is total.
    pub fn resolve(requested: Vec<FilterOrderInfo>, descriptor: &ResourceDescriptor) -> Vec<FilterOrderInfo> {
        let mut order = if requested.is_empty() {
            let (column, sort) = descriptor.default_sort;
            vec![FilterOrderInfo::new(column, sort, descriptor.kind_of(column))]
        } else {
            requested
        };

        // Drop repeated columns; the first mention wins
        let mut seen: Vec<String> = vec![];
        order.retain(|term| {
            if seen.contains(&term.column) {
                false
            } else {
                seen.push(term.column.clone());
                true
            }
        });

        if !order.iter().any(|t| t.column == descriptor.primary_key) {
            order.push(FilterOrderInfo::new(
                descriptor.primary_key,
                SortDirection::Asc,
                descriptor.kind_of(descriptor.primary_key),
            ));
        }
        order
    }

    pub fn reversed(order: &[FilterOrderInfo]) -> Vec<FilterOrderInfo> {
        order.iter().map(|t| t.reversed()).collect()
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(infos.len());
        for info in infos {
            validate_identifier(&info.column)?;
            parts.push(format!("{} {}", qualified(MAIN_ALIAS, &info.column), info.sort.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::user::USER_RESOURCE;
    use crate::resource::ColumnKind;

    #[test]
    fn default_sort_gets_tiebreaker() {
        let order = FilterOrder::resolve(vec![], &USER_RESOURCE);
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].column, "created_at");
        assert_eq!(order[0].sort, SortDirection::Desc);
        assert_eq!(order[1].column, "id");
        assert_eq!(order[1].sort, SortDirection::Asc);
    }

    #[test]
    fn duplicate_terms_collapse() {
        let order = FilterOrder::resolve(
            vec![
                FilterOrderInfo::new("email", SortDirection::Asc, ColumnKind::Text),
                FilterOrderInfo::new("email", SortDirection::Desc, ColumnKind::Text),
                FilterOrderInfo::new("id", SortDirection::Desc, ColumnKind::Integer),
            ],
            &USER_RESOURCE,
        );
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].sort, SortDirection::Asc);
        assert_eq!(order[1].sort, SortDirection::Desc);
    }

    #[test]
    fn generates_order_by() {
        let order = vec![
            FilterOrderInfo::new("fullname", SortDirection::Desc, ColumnKind::Text),
            FilterOrderInfo::new("id", SortDirection::Asc, ColumnKind::Integer),
        ];
        assert_eq!(
            FilterOrder::generate(&order).unwrap(),
            "ORDER BY \"t0\".\"fullname\" DESC, \"t0\".\"id\" ASC"
        );
        assert_eq!(
            FilterOrder::generate(&FilterOrder::reversed(&order)).unwrap(),
            "ORDER BY \"t0\".\"fullname\" ASC, \"t0\".\"id\" DESC"
        );
        assert_eq!(FilterOrder::generate(&[]).unwrap(), "");
    }
}
