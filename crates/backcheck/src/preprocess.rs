use crate::dataset::Dataset;
use crate::normalize::{normalize_column, NormalizeOptions};

/// Normalize every column of a dataset. Each dataset is processed on its own.
pub fn preprocess(dataset: &Dataset, opts: &NormalizeOptions) -> Dataset {
    if opts.is_noop() {
        return dataset.clone();
    }

    tracing::debug!(dataset = %dataset.name, ?opts, "normalizing text columns");
    Dataset {
        name: dataset.name.clone(),
        columns: dataset
            .columns
            .iter()
            .map(|c| normalize_column(c, opts))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::model::Value;

    fn survey() -> Dataset {
        Dataset::new("survey")
            .with_column(Column::text("id", vec![Some("a-1"), Some("a-2")]))
            .with_column(Column::text("name", vec![Some(" Ann  Lee"), Some("BOB")]))
            .with_column(Column::numeric("age", vec![Some(30.0), None]))
    }

    #[test]
    fn every_text_column_normalized() {
        let opts = NormalizeOptions::from_flags(true, false, true, true).unwrap();
        let out = preprocess(&survey(), &opts);
        assert_eq!(out.column("id").unwrap().values[0], Value::text("a1"));
        assert_eq!(out.column("name").unwrap().values[0], Value::text("ann lee"));
        assert_eq!(out.column("name").unwrap().values[1], Value::text("bob"));
        assert_eq!(out.column("age").unwrap(), survey().column("age").unwrap());
    }

    #[test]
    fn running_twice_is_idempotent() {
        let opts = NormalizeOptions::from_flags(false, true, true, true).unwrap();
        let once = preprocess(&survey(), &opts);
        let twice = preprocess(&once, &opts);
        assert_eq!(once, twice);
    }
}
