use serde::Serialize;

use super::blocks::SectionBlock;
use super::context::Context;
use super::rows::RawRow;
use super::tables::DimensionTable;

/// Fixed output column order.
pub const COLUMNS: &[&str] = &[
    "section_id",
    "priority",
    "objective",
    "funding_programme",
    "scope",
    "dimension",
    "code",
    "description",
    "amount",
];

/// One allocation row with its block and table context.
///
/// `amount` is NaN when the closing amount did not normalize; it serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRecord {
    pub section_id: String,
    pub priority: Option<String>,
    pub objective: Option<String>,
    pub funding_programme: Option<String>,
    pub scope: String,
    pub dimension_label: String,
    pub code: String,
    pub description: String,
    pub amount: f64,
}

impl RowRecord {
    /// Cell values in [`COLUMNS`] order.
    pub fn cells(&self) -> [String; 9] {
        [
            self.section_id.clone(),
            self.priority.clone().unwrap_or_default(),
            self.objective.clone().unwrap_or_default(),
            self.funding_programme.clone().unwrap_or_default(),
            self.scope.clone(),
            self.dimension_label.clone(),
            self.code.clone(),
            self.description.clone(),
            if self.amount.is_nan() { String::new() } else { format!("{:.2}", self.amount) },
        ]
    }

    pub fn amount_or_none(&self) -> Option<f64> {
        if self.amount.is_nan() {
            None
        } else {
            Some(self.amount)
        }
    }
}

/// Attach block and table context to every raw row, keeping row order.
pub fn assemble(
    block: &SectionBlock<'_>,
    context: &Context,
    table: &DimensionTable<'_>,
    rows: Vec<RawRow>,
) -> Vec<RowRecord> {
    rows.into_iter()
        .map(|row| RowRecord {
            section_id: block.section_id.clone(),
            priority: context.priority.clone(),
            objective: context.objective.clone(),
            funding_programme: context.funding_programme.clone(),
            scope: context.scope.clone(),
            dimension_label: table.dimension_label.clone(),
            code: row.code,
            description: row.description,
            amount: row.amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_copied_onto_each_row() {
        let block = SectionBlock { section_id: "2.1.1.1.3".into(), body: "" };
        let context = Context {
            priority: Some("1".into()),
            objective: Some("RSO1.1".into()),
            funding_programme: Some("EFRE".into()),
            scope: "Übergangsregionen".into(),
        };
        let table = DimensionTable {
            index: 1,
            dimension_label: "Dimension 1 – Interventionsbereich".into(),
            lines: Vec::new(),
        };
        let rows = vec![
            RawRow { code: "001".into(), description: "A".into(), amount: 1000.0 },
            RawRow { code: "002".into(), description: "B".into(), amount: f64::NAN },
        ];
        let records = assemble(&block, &context, &table, rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].section_id, "2.1.1.1.3");
        assert_eq!(records[1].funding_programme.as_deref(), Some("EFRE"));
        assert_eq!(records[0].cells()[8], "1000.00");
        assert_eq!(records[1].cells()[8], "");
        assert_eq!(records[1].amount_or_none(), None);
    }

    #[test]
    fn nan_serializes_as_null() {
        let record = RowRecord {
            section_id: "2.A.1".into(),
            priority: None,
            objective: None,
            funding_programme: None,
            scope: String::new(),
            dimension_label: "Dimension 2".into(),
            code: "01".into(),
            description: String::new(),
            amount: f64::NAN,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["amount"].is_null());
        assert!(json["priority"].is_null());
    }
}
