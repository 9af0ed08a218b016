//! Contain specs - per-query eager-load registration
//!
//! A contain spec names an association to resolve after the base query runs,
//! plus per-call overrides for that load. Specs nest, one level per
//! association hop.

use super::types::{OrderDirection, WhereCondition};

/// Eager-load registration for one association
#[derive(Debug, Clone, Default)]
pub struct ContainSpec {
    /// Association name on the base table
    pub association: String,
    /// Extra conditions, applied after the association's defaults
    pub conditions: Vec<WhereCondition>,
    /// Sort override; wins over the association's default sort
    pub sort: Vec<(String, OrderDirection)>,
    /// Field subset override; `None` selects the whole target schema
    pub fields: Option<Vec<String>>,
    /// Nested eager-load steps on the target table
    pub nested: Vec<ContainSpec>,
}

impl ContainSpec {
    /// Contain an association with default loading behavior
    pub fn new(association: &str) -> Self {
        Self {
            association: association.to_string(),
            ..Default::default()
        }
    }

    /// Add override conditions
    pub fn with_conditions(mut self, conditions: Vec<WhereCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Override the sort order
    pub fn with_sort(mut self, sort: Vec<(String, OrderDirection)>) -> Self {
        self.sort = sort;
        self
    }

    /// Restrict the projected fields
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Nest a further eager-load step on the target table
    pub fn with_nested(mut self, nested: ContainSpec) -> Self {
        self.nested.push(nested);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_contain_builds_a_chain() {
        let spec = ContainSpec::new("Articles")
            .with_nested(ContainSpec::new("Comments").with_fields(vec![
                "id".to_string(),
                "article_id".to_string(),
            ]));

        assert_eq!(spec.association, "Articles");
        assert_eq!(spec.nested.len(), 1);
        assert_eq!(spec.nested[0].association, "Comments");
        assert!(spec.nested[0].fields.is_some());
    }
}
