// Property-based tests using proptest
// Path containment and argument formatting must hold for arbitrary input

use code_locate::config::OpenMode;
use code_locate::editor::format::format_args;
use code_locate::service::{normalize, resolve_within};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

/// One segment of a requested relative path
fn segment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-zA-Z0-9_-]{1,8}(\\.[a-z]{1,3})?",
        2 => Just("..".to_string()),
        1 => Just(".".to_string()),
    ]
}

fn relative_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(segment_strategy(), 1..8).prop_map(|segments| segments.join("/"))
}

fn open_mode_strategy() -> impl Strategy<Value = OpenMode> {
    prop_oneof![
        Just(OpenMode::Reuse),
        Just(OpenMode::New),
        Just(OpenMode::Auto)
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Whatever the request, an accepted file lies under the project root
    #[test]
    fn prop_accepted_files_stay_inside_root(file in relative_path_strategy()) {
        let root = Path::new("/work/project");
        if let Some(resolved) = resolve_within(root, &file) {
            prop_assert!(resolved.starts_with(root), "{:?} escaped via {:?}", resolved, file);
            prop_assert_eq!(normalize(&resolved), resolved.clone());
        }
    }

    /// Paths without parent segments are never rejected
    #[test]
    fn prop_plain_relative_paths_are_accepted(
        segments in prop::collection::vec("[a-zA-Z0-9_-]{1,8}", 1..6)
    ) {
        let root = Path::new("/work/project");
        let file = segments.join("/");
        let expected: PathBuf = segments.iter().fold(root.to_path_buf(), |path, s| path.join(s));
        prop_assert_eq!(resolve_within(root, &file), Some(expected));
    }

    /// Escaping by exactly one level more than the depth is always refused
    #[test]
    fn prop_climbing_out_is_rejected(depth in 0usize..5, name in "[a-z]{1,8}") {
        let root = Path::new("/work/project");
        let mut parts: Vec<String> = (0..depth).map(|i| format!("d{i}")).collect();
        parts.extend(std::iter::repeat("..".to_string()).take(depth + 1));
        parts.push(name);
        prop_assert_eq!(resolve_within(root, &parts.join("/")), None);
    }

    /// Multi-window editors always end with file:line:column, column clamped
    #[test]
    fn prop_multi_window_position(
        line in 1u32..100_000,
        column in any::<i64>(),
        mode in open_mode_strategy(),
        workspace in prop::option::of(Just("/proj")),
    ) {
        let args = format_args(
            "code",
            "/a/b.ts",
            line,
            column,
            mode,
            workspace.map(Path::new),
            None,
        );
        let expected = format!("/a/b.ts:{}:{}", line, column.max(1));
        prop_assert_eq!(args.last(), Some(&expected));
        prop_assert!(args.contains(&"-g".to_string()));
        prop_assert_eq!(args.first().map(String::as_str) == Some("/proj"), workspace.is_some());
    }

    /// Unknown programs only ever receive the file
    #[test]
    fn prop_unknown_editor_gets_file_only(
        command in "[a-z]{3,10}-unknown",
        line in 1u32..1000,
        column in any::<i64>(),
        mode in open_mode_strategy(),
    ) {
        let args = format_args(&command, "/a/b.ts", line, column, mode, Some(Path::new("/proj")), None);
        prop_assert_eq!(args, vec!["/a/b.ts".to_string()]);
    }
}
