///
/// Column projection.
///
/// Produces the column list substituted for a template's column marker.
/// Columns are sorted lexicographically so the same schema always yields
/// byte-identical SQL, independent of declaration order and cache state.
///

use crate::metadata::{Registry, ResolveMode};
use crate::schema::Record;

impl Registry {
    /// Sorted column names of `R`, primary key included.
    pub fn columns<R: Record>(&self) -> Vec<String> {
        let fields = self.resolve::<R>(ResolveMode::ALL);
        let mut names: Vec<String> = fields.keys().cloned().collect();
        names.sort();
        names
    }

    /// `a, b, c`
    pub fn column_list<R: Record>(&self) -> String {
        self.columns::<R>().join(", ")
    }

    /// `t.a AS t_a, t.b AS t_b`
    pub fn column_list_aliased<R: Record>(&self, alias: &str) -> String {
        self.columns::<R>()
            .iter()
            .map(|column| format!("{alias}.{column} AS {alias}_{column}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Replaces the first `marker` in `template` with `SELECT <columns>`.
///
/// The marker stands for the whole select list including the keyword, so
/// `SELECT * FROM t` becomes `SELECT a, b FROM t`.
pub fn substitute_columns(template: &str, marker: &str, columns: &str) -> String {
    if marker.is_empty() {
        return template.to_string();
    }
    template.replacen(marker, &format!("SELECT {columns}"), 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NameMapper;
    use crate::record;

    #[derive(Debug, Default)]
    struct Embedded {
        field_e: String,
    }

    #[derive(Debug, Default)]
    struct Sample {
        field_a: String,
        field_b: String,
        field_c: String,
        field_d: String,
        embedded: Embedded,
    }

    #[derive(Debug, Default)]
    struct Pair {
        field_a: String,
        field_sec: String,
    }

    record!(Embedded {
        field_e: String => value,
    });

    record!(Sample {
        field_a: String => value,
        field_b: String => value [skip],
        field_c: String => value [column = "field_C"],
        field_d: String => value [column = "Field_D"],
        embedded: Embedded => embedded,
    });

    record!(Pair {
        field_sec: String => value,
        field_a: String => value,
    });

    #[test]
    fn test_column_list_is_sorted() {
        let registry = Registry::new();
        insta::assert_snapshot!(
            registry.column_list::<Sample>(),
            @"field_a, field_c, field_d, field_e"
        );
        insta::assert_snapshot!(registry.column_list::<Pair>(), @"field_a, field_sec");
    }

    #[test]
    fn test_column_list_is_stable_across_calls() {
        let registry = Registry::new();
        let first = registry.column_list::<Sample>();
        let second = registry.column_list::<Sample>();
        assert_eq!(first, second);

        let fresh = Registry::new();
        assert_eq!(first, fresh.column_list::<Sample>());
    }

    #[test]
    fn test_column_list_aliased() {
        let registry = Registry::new();
        assert_eq!(
            registry.column_list_aliased::<Sample>("t1"),
            "t1.field_a AS t1_field_a, t1.field_c AS t1_field_c, \
             t1.field_d AS t1_field_d, t1.field_e AS t1_field_e"
        );
        assert_eq!(
            registry.column_list_aliased::<Pair>("t2"),
            "t2.field_a AS t2_field_a, t2.field_sec AS t2_field_sec"
        );
    }

    #[test]
    fn test_columns_follow_the_name_mapper() {
        #[derive(Debug, Default)]
        struct Person {
            first_name: String,
            last_name: String,
        }
        record!(Person {
            first_name: String => value [column = "FirstName"],
            last_name: String => value [column = "LastName"],
        });

        let lower = Registry::new();
        assert_eq!(lower.columns::<Person>(), vec!["firstname", "lastname"]);

        let snake = Registry::with_names(NameMapper::snake());
        assert_eq!(snake.columns::<Person>(), vec!["first_name", "last_name"]);
    }

    #[test]
    fn test_substitute_columns_replaces_first_marker_only() {
        let sql = substitute_columns(
            "SELECT * FROM users WHERE id IN (SELECT * FROM x)",
            "SELECT *",
            "id, name",
        );
        assert_eq!(sql, "SELECT id, name FROM users WHERE id IN (SELECT * FROM x)");

        let untouched = substitute_columns("SELECT id FROM users", "SELECT *", "id, name");
        assert_eq!(untouched, "SELECT id FROM users");
    }
}
