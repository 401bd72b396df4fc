///
/// IN-list expansion.
///
/// Rewrites the single IN-marker of a template (`IN (*)` by default) into a
/// placeholder list sized to the argument it consumes, and flattens that
/// argument into the final positional argument list.
///
/// The consumed argument is found by counting the `?` placeholders that
/// appear before the marker. When the marker is the template's only
/// placeholder, every argument belongs to it. An empty list never produces
/// `IN ()`; the marker degrades to `= FALSE` and the list is removed from
/// the arguments so the remaining placeholders stay aligned.
///

use memchr::{memchr_iter, memmem};

use crate::error::{Error, Result};
use crate::value::{Arg, Value};

/// Substituted for the marker when the IN list is empty.
pub const FALSE_PREDICATE: &str = "= FALSE";

#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    pub sql: String,
    pub args: Vec<Value>,
}

pub fn expand(template: &str, marker: &str, args: Vec<Arg>) -> Result<Expanded> {
    let markers = count_markers(template, marker);
    if markers > 1 {
        return Err(Error::usage(format!(
            "only one '{}' marker is supported per query; found {}",
            marker, markers
        )));
    }

    if markers == 0 {
        return Ok(Expanded {
            sql: template.to_string(),
            args: scalars(args)?,
        });
    }

    let question_marks = memchr_iter(b'?', template.as_bytes()).count();
    let expanded = if question_marks == 0 {
        expand_sole(template, marker, args)?
    } else {
        expand_positioned(template, marker, args)?
    };

    tracing::trace!(sql = %expanded.sql, args = expanded.args.len(), "expanded IN marker");
    Ok(expanded)
}

/// `?, ?, ?` for `count` = 3.
pub fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 3);
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

/// Replaces the element at `index` with all of `items`, keeping the order of
/// everything before and after it.
pub fn flatten_at<T>(mut values: Vec<T>, index: usize, items: Vec<T>) -> Vec<T> {
    let tail = values.split_off(index + 1);
    values.truncate(index);
    values.extend(items);
    values.extend(tail);
    values
}

pub fn count_markers(template: &str, marker: &str) -> usize {
    if marker.is_empty() {
        return 0;
    }
    memmem::find_iter(template.as_bytes(), marker.as_bytes()).count()
}

/// The marker is the only placeholder: all arguments belong to it.
fn expand_sole(template: &str, marker: &str, args: Vec<Arg>) -> Result<Expanded> {
    let items = match <[Arg; 1]>::try_from(args) {
        Ok([Arg::List(items)]) => items,
        Ok([Arg::Scalar(value)]) => vec![value],
        Err(args) => scalars(args)?,
    };

    if items.is_empty() {
        check_negated(template, marker)?;
        return Ok(Expanded {
            sql: template.replacen(marker, FALSE_PREDICATE, 1),
            args: Vec::new(),
        });
    }

    Ok(Expanded {
        sql: template.replacen(marker, &in_list(items.len()), 1),
        args: items,
    })
}

/// The marker shares the template with ordinary placeholders.
fn expand_positioned(template: &str, marker: &str, mut args: Vec<Arg>) -> Result<Expanded> {
    let position = memmem::find(template.as_bytes(), marker.as_bytes()).unwrap_or(template.len());
    let index = memchr_iter(b'?', &template.as_bytes()[..position]).count();

    if args.len() <= index {
        return Err(Error::Arity {
            index,
            supplied: args.len(),
        });
    }

    let items = match std::mem::replace(&mut args[index], Arg::Scalar(Value::Null)) {
        Arg::List(items) => items,
        Arg::Scalar(value) => vec![value],
    };
    let values = scalars(args)?;

    if items.is_empty() {
        check_negated(template, marker)?;
        return Ok(Expanded {
            sql: template.replacen(marker, FALSE_PREDICATE, 1),
            args: flatten_at(values, index, Vec::new()),
        });
    }

    let sql = template.replacen(marker, &in_list(items.len()), 1);
    Ok(Expanded {
        sql,
        args: flatten_at(values, index, items),
    })
}

fn in_list(count: usize) -> String {
    format!("IN ({})", placeholders(count))
}

fn scalars(args: Vec<Arg>) -> Result<Vec<Value>> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| match arg {
            Arg::Scalar(value) => Ok(value),
            Arg::List(_) => Err(Error::usage(format!(
                "argument {} is a list but no IN marker consumes it",
                i
            ))),
        })
        .collect()
}

/// `x NOT IN (*)` with an empty list has no constant-false rewrite.
fn check_negated(template: &str, marker: &str) -> Result<()> {
    let position = template.find(marker).unwrap_or(0);
    let before = template[..position].trim_end();
    let negated = before.len() >= 3
        && before.is_char_boundary(before.len() - 3)
        && before[before.len() - 3..].eq_ignore_ascii_case("not")
        && before[..before.len() - 3]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric() && c != '_');
    if negated {
        return Err(Error::usage(
            "an empty list cannot be expanded for NOT IN; handle the empty case before querying",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    const MARKER: &str = "IN (*)";

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Integer(*v)).collect()
    }

    #[test]
    fn test_sole_marker_with_flat_args() {
        let out = expand("DELETE FROM t WHERE id IN (*)", MARKER, args![1, 2, 3]).unwrap();
        assert_eq!(out.sql, "DELETE FROM t WHERE id IN (?, ?, ?)");
        assert_eq!(out.args, ints(&[1, 2, 3]));
    }

    #[test]
    fn test_sole_marker_with_single_list_flattens() {
        let out = expand("DELETE FROM t WHERE id IN (*)", MARKER, args![vec![4, 5]]).unwrap();
        assert_eq!(out.sql, "DELETE FROM t WHERE id IN (?, ?)");
        assert_eq!(out.args, ints(&[4, 5]));
    }

    #[test]
    fn test_sole_marker_with_single_scalar() {
        let out = expand("SELECT a FROM t WHERE id IN (*)", MARKER, args![9]).unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE id IN (?)");
        assert_eq!(out.args, ints(&[9]));
    }

    #[test]
    fn test_sole_marker_without_args_degrades_to_false() {
        let out = expand("SELECT a FROM t WHERE id IN (*)", MARKER, args![]).unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE id = FALSE");
        assert!(out.args.is_empty());
    }

    #[test]
    fn test_sole_marker_with_empty_list_degrades_to_false() {
        let out = expand(
            "SELECT a FROM t WHERE id IN (*)",
            MARKER,
            vec![Arg::List(Vec::new())],
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE id = FALSE");
        assert!(out.args.is_empty());
    }

    #[test]
    fn test_positioned_marker_flattens_list() {
        let out = expand(
            "DELETE FROM t WHERE id=? AND name IN (*)",
            MARKER,
            args![0, vec![1, 2, 3]],
        )
        .unwrap();
        assert_eq!(out.sql, "DELETE FROM t WHERE id=? AND name IN (?, ?, ?)");
        assert_eq!(out.args, ints(&[0, 1, 2, 3]));
    }

    #[test]
    fn test_positioned_marker_preserves_order_around_list() {
        let template = "SELECT a FROM t WHERE x=? AND y IN (*) AND z=? AND w=?";
        let out = expand(template, MARKER, args!["x", vec!["p", "q"], "z", "w"]).unwrap();
        assert_eq!(
            out.sql,
            "SELECT a FROM t WHERE x=? AND y IN (?, ?) AND z=? AND w=?"
        );
        let texts: Vec<_> = out
            .args
            .iter()
            .map(|v| match v {
                Value::Text(s) => s.as_str(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(texts, vec!["x", "p", "q", "z", "w"]);
    }

    #[test]
    fn test_positioned_marker_at_start() {
        let out = expand(
            "SELECT a FROM t WHERE id IN (*) AND name LIKE ?",
            MARKER,
            args![vec![1, 2, 3], "a%"],
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE id IN (?, ?, ?) AND name LIKE ?");
        assert_eq!(
            out.args,
            vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
                Value::Text("a%".to_string())
            ]
        );
    }

    #[test]
    fn test_positioned_empty_list_is_removed() {
        let out = expand(
            "UPDATE t SET a=? WHERE id IN (*) AND b=?",
            MARKER,
            args![1, Vec::<i64>::new(), 2],
        )
        .unwrap();
        assert_eq!(out.sql, "UPDATE t SET a=? WHERE id = FALSE AND b=?");
        assert_eq!(out.args, ints(&[1, 2]));
    }

    #[test]
    fn test_positioned_scalar_is_a_single_element_list() {
        let out = expand("SELECT a FROM t WHERE b=? AND id IN (*)", MARKER, args![1, 2]).unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE b=? AND id IN (?)");
        assert_eq!(out.args, ints(&[1, 2]));
    }

    #[test]
    fn test_two_markers_is_usage_error() {
        let template = "SELECT a FROM t WHERE id IN (*) AND b IN (*)";
        for arguments in [args![], args![vec![1], vec![2]], args![1, 2, 3]] {
            let err = expand(template, MARKER, arguments).unwrap_err();
            assert!(matches!(err, Error::Usage(_)), "got {:?}", err);
        }
    }

    #[test]
    fn test_missing_argument_is_arity_error() {
        let err = expand("SELECT a FROM t WHERE b=? AND id IN (*)", MARKER, args![1]).unwrap_err();
        match err {
            Error::Arity { index, supplied } => {
                assert_eq!(index, 1);
                assert_eq!(supplied, 1);
            }
            other => panic!("Expected Arity error, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_list_is_usage_error() {
        let err = expand("SELECT a FROM t WHERE b=?", MARKER, args![vec![1, 2]]).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));

        let err = expand(
            "SELECT a FROM t WHERE b=? AND id IN (*) AND c=?",
            MARKER,
            args![vec![1], vec![2], 3],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn test_without_marker_passes_scalars_through() {
        let out = expand("SELECT a FROM t WHERE b=?", MARKER, args![5]).unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE b=?");
        assert_eq!(out.args, ints(&[5]));
    }

    #[test]
    fn test_empty_not_in_is_rejected() {
        let err = expand("SELECT a FROM t WHERE id NOT IN (*)", MARKER, args![]).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));

        let out = expand("SELECT a FROM t WHERE id NOT IN (*)", MARKER, args![vec![1]]).unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE id NOT IN (?)");

        let out = expand("SELECT a FROM t WHERE knot IN (*)", MARKER, args![]).unwrap();
        assert_eq!(out.sql, "SELECT a FROM t WHERE knot = FALSE");
    }

    #[test]
    fn test_flatten_at_positions() {
        let start = flatten_at(vec!["X", "B", "C", "D"], 0, vec!["1", "2"]);
        assert_eq!(start, vec!["1", "2", "B", "C", "D"]);

        let middle = flatten_at(vec!["A", "B", "X", "D", "E"], 2, vec!["1", "2", "3"]);
        assert_eq!(middle, vec!["A", "B", "1", "2", "3", "D", "E"]);

        let end = flatten_at(vec!["A", "B", "C", "X"], 3, vec!["1", "2", "3"]);
        assert_eq!(end, vec!["A", "B", "C", "1", "2", "3"]);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
