use core_ex::{
    AddressRef, ExAddressRange, ExCommandTable, ExErrorKind, ExRangeParser, Separator,
    parse_command_line,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn substitute_over_a_numeric_range() {
    let table = ExCommandTable::builtin().unwrap();
    let cmds = parse_command_line(&table, "1,5s/foo/bar/g").unwrap();
    assert_eq!(cmds.len(), 1);
    let cmd = &cmds[0];
    assert_eq!(cmd.name, "substitute");
    assert_eq!(cmd.target, "ex-substitute");
    assert!(cmd.parse_errors.is_empty());
    let args: Vec<(&str, &str)> = cmd
        .args
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        args,
        vec![("flags", "g"), ("pattern", "foo"), ("replacement", "bar")]
    );
    assert_eq!(cmd.line_range.left.offset, Some(1));
    assert_eq!(cmd.line_range.left.reference, None);
    assert_eq!(cmd.line_range.right.offset, Some(5));
    assert_eq!(cmd.line_range.separator, Some(Separator::Comma));
    assert!(cmd.can_have_range);
}

#[test]
fn address_followed_by_garbage_is_not_a_command() {
    let table = ExCommandTable::builtin().unwrap();
    let err = parse_command_line(&table, "10$foo").unwrap_err();
    assert_eq!(err.kind, ExErrorKind::UnknownCommand);
    assert_eq!(err.to_string(), "E492: Not an editor command: 10$foo");
}

#[test]
fn visual_range_prefix() {
    let table = ExCommandTable::builtin().unwrap();
    let cmds = parse_command_line(&table, ":'<,'>d").unwrap();
    assert_eq!(cmds[0].name, "delete");
    assert!(cmds[0].line_range.is_visual_selection());
    assert_eq!(cmds[0].line_range.left.reference, Some(AddressRef::Mark('<')));
}

fn arg_pairs(line: &str) -> Vec<(String, String)> {
    let table = ExCommandTable::builtin().unwrap();
    let cmds = parse_command_line(&table, line).unwrap();
    assert!(cmds[0].parse_errors.is_empty(), "{line}: {:?}", cmds[0].parse_errors);
    cmds[0].args.clone().into_iter().collect()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn leading_digits_are_counts() {
    assert_eq!(arg_pairs("d3"), pairs(&[("count", "3")]));
    assert_eq!(arg_pairs("d 3"), pairs(&[("count", "3")]));
    assert_eq!(arg_pairs("d 12"), pairs(&[("count", "12")]));
    assert_eq!(arg_pairs("y 4"), pairs(&[("count", "4")]));
    assert_eq!(arg_pairs("d a 3"), pairs(&[("count", "3"), ("register", "a")]));
    assert_eq!(arg_pairs("d a"), pairs(&[("register", "a")]));
}

#[test]
fn join_takes_a_count_and_flags_but_no_register() {
    assert_eq!(arg_pairs("j 5"), pairs(&[("count", "5")]));
    assert_eq!(arg_pairs("join 2 #"), pairs(&[("count", "2"), ("flags", "#")]));

    let table = ExCommandTable::builtin().unwrap();
    let cmds = parse_command_line(&table, "j a").unwrap();
    assert_eq!(cmds[0].parse_errors[0].kind, ExErrorKind::InvalidRange);
}

#[test]
fn put_names_numbered_registers() {
    assert_eq!(arg_pairs("pu 3"), pairs(&[("register", "3")]));
}

fn address() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["", ".", "$", "'a", "'<", "'>"]),
        prop::sample::select(vec!["", "+", "-3", "7", "+2-1", "--"]),
        prop::sample::select(vec!["", "/foo/", "?bar?+1", "/a\\/b/-2"]),
    )
        .prop_map(|(r, o, s)| format!("{r}{o}{s}"))
}

fn range_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("%".to_string()),
        address(),
        (address(), prop::sample::select(vec![",", ";"]), address())
            .prop_map(|(l, sep, r)| format!("{l}{sep}{r}")),
    ]
}

fn parse_range(text: &str) -> ExAddressRange {
    ExRangeParser::parse(text).unwrap().0
}

proptest! {
    #[test]
    fn reparsing_raw_text_is_stable(range in range_text(), command in prop::sample::select(vec!["", "d", " yank", "|p"])) {
        let line = format!("{range}{command}");
        let first = parse_range(&line);
        prop_assert_eq!(first.raw_text.as_str(), range.as_str());
        let second = parse_range(&first.raw_text);
        prop_assert_eq!(second, first);
    }
}
