//! Row query description shared by every [`Backend`](super::Backend).
//!
//! A [`Query`] is a plain value: filters, relation embeds, ordering and a
//! row limit. The hosted backend receives it rendered as a REST query string
//! (see [`Query::to_pairs`]); the in-memory backend interprets it directly.

use serde::Serialize;
use serde_json::Value;

/// A single row filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`.
    Eq(String, Value),
    /// `column IS NULL`.
    IsNull(String),
}

/// Whether an embedded relation yields one row or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// The foreign key lives on the queried row and points at `table.id`.
    One,
    /// The foreign key lives on `table` rows and points back at this row's `id`.
    Many,
}

/// A related table embedded into each returned row under `alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    pub foreign_key: String,
    pub cardinality: Cardinality,
}

impl Embed {
    /// To-one relation, e.g. `Embed::one("product", "products", "product_id")`.
    #[must_use]
    pub fn one(alias: &str, table: &str, foreign_key: &str) -> Self {
        Self {
            alias: alias.to_owned(),
            table: table.to_owned(),
            foreign_key: foreign_key.to_owned(),
            cardinality: Cardinality::One,
        }
    }

    /// To-many relation, e.g. `Embed::many("images", "product_images", "product_id")`.
    #[must_use]
    pub fn many(alias: &str, table: &str, foreign_key: &str) -> Self {
        Self {
            alias: alias.to_owned(),
            table: table.to_owned(),
            foreign_key: foreign_key.to_owned(),
            cardinality: Cardinality::Many,
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Filters, embeds, ordering and limit for one table request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub embeds: Vec<Embed>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// Match every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter. Values that fail to serialize compare as `null`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.filters.push(Filter::Eq(column.to_owned(), value));
        self
    }

    /// Equality when `value` is `Some`, `IS NULL` otherwise.
    #[must_use]
    pub fn eq_or_null<T: Serialize>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self.is_null(column),
        }
    }

    /// Add an `IS NULL` filter.
    #[must_use]
    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_owned()));
        self
    }

    /// Embed a related table.
    #[must_use]
    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// Append a sort key.
    #[must_use]
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.to_owned(),
            ascending,
        });
        self
    }

    /// Return at most `n` rows.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// The `select` column list, e.g. `*,product:products(*)`.
    #[must_use]
    pub fn select_clause(&self) -> String {
        let mut select = String::from("*");
        for embed in &self.embeds {
            select.push(',');
            select.push_str(&embed.alias);
            select.push(':');
            select.push_str(&embed.table);
            select.push_str("(*)");
        }
        select
    }

    /// Filter parameters only (used by update and delete requests).
    #[must_use]
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|filter| match filter {
                Filter::Eq(column, Value::Null) | Filter::IsNull(column) => {
                    (column.clone(), "is.null".to_owned())
                }
                Filter::Eq(column, value) => (column.clone(), format!("eq.{}", scalar(value))),
            })
            .collect()
    }

    /// Full REST query parameters for a read.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_owned(), self.select_clause())];
        pairs.extend(self.filter_pairs());
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| {
                    format!(
                        "{}.{}",
                        o.column,
                        if o.ascending { "asc" } else { "desc" }
                    )
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_owned(), order));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_owned(), limit.to_string()));
        }
        pairs
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_owned(), v.to_owned())
    }

    #[test]
    fn test_cart_query_pairs() {
        let query = Query::new()
            .embed(Embed::one("product", "products", "product_id"))
            .embed(Embed::one("variant", "product_variants", "variant_id"))
            .eq("user_id", "u-1");
        assert_eq!(
            query.to_pairs(),
            vec![
                pair(
                    "select",
                    "*,product:products(*),variant:product_variants(*)"
                ),
                pair("user_id", "eq.u-1"),
            ]
        );
    }

    #[test]
    fn test_bool_order_and_limit() {
        let query = Query::new()
            .eq("is_active", true)
            .order("created_at", false)
            .order("name", true)
            .limit(5);
        assert_eq!(
            query.to_pairs(),
            vec![
                pair("select", "*"),
                pair("is_active", "eq.true"),
                pair("order", "created_at.desc,name.asc"),
                pair("limit", "5"),
            ]
        );
    }

    #[test]
    fn test_eq_or_null() {
        let none: Option<&str> = None;
        let query = Query::new()
            .eq_or_null("variant_id", none)
            .eq_or_null("product_id", Some("p-1"));
        assert_eq!(
            query.filter_pairs(),
            vec![pair("variant_id", "is.null"), pair("product_id", "eq.p-1")]
        );
    }
}
