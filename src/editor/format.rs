//! Editor argument formatting
//!
//! Maps an editor command plus a source position to the argument vector that
//! editor understands. Editors are grouped into a small closed set of
//! [`ArgStyle`]s keyed by the command's basename; anything unrecognised only
//! receives the file path.

use crate::config::{OpenMode, PathFormat};
use std::path::Path;

/// How an editor family expects to receive a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgStyle {
    /// `file:line:column` as one argument (Sublime Text, Zed, Helix)
    Combined,
    /// `+call cursor(line, column) file` (Vim family)
    LineFlag,
    /// `+line:column file` (Emacs, nano, joe)
    PlusPosition,
    /// `--line line file` (TextMate, rmate)
    LineOption,
    /// `[workspace] --line line file` (JetBrains IDEs)
    WorkspaceLine,
    /// `[workspace] -g [-r|-n] file:line:column` (VS Code family)
    MultiWindow,
    /// `-nline -ccolumn file`
    NotepadPlusPlus,
    /// Only the file path; positions are not passed to unknown programs
    FileOnly,
}

/// Basename → style table. Names are compared after [`editor_family`]
/// normalisation.
const FAMILIES: &[(&str, ArgStyle)] = &[
    ("code", ArgStyle::MultiWindow),
    ("code-insiders", ArgStyle::MultiWindow),
    ("codium", ArgStyle::MultiWindow),
    ("vscodium", ArgStyle::MultiWindow),
    ("cursor", ArgStyle::MultiWindow),
    ("windsurf", ArgStyle::MultiWindow),
    ("trae", ArgStyle::MultiWindow),
    ("positron", ArgStyle::MultiWindow),
    ("webstorm", ArgStyle::WorkspaceLine),
    ("idea", ArgStyle::WorkspaceLine),
    ("phpstorm", ArgStyle::WorkspaceLine),
    ("pycharm", ArgStyle::WorkspaceLine),
    ("goland", ArgStyle::WorkspaceLine),
    ("rider", ArgStyle::WorkspaceLine),
    ("clion", ArgStyle::WorkspaceLine),
    ("rubymine", ArgStyle::WorkspaceLine),
    ("rustrover", ArgStyle::WorkspaceLine),
    ("appcode", ArgStyle::WorkspaceLine),
    ("studio", ArgStyle::WorkspaceLine),
    ("subl", ArgStyle::Combined),
    ("sublime_text", ArgStyle::Combined),
    ("atom", ArgStyle::Combined),
    ("zed", ArgStyle::Combined),
    ("zeditor", ArgStyle::Combined),
    ("hx", ArgStyle::Combined),
    ("helix", ArgStyle::Combined),
    ("lapce", ArgStyle::Combined),
    ("vim", ArgStyle::LineFlag),
    ("vi", ArgStyle::LineFlag),
    ("nvim", ArgStyle::LineFlag),
    ("mvim", ArgStyle::LineFlag),
    ("gvim", ArgStyle::LineFlag),
    ("emacs", ArgStyle::PlusPosition),
    ("emacsclient", ArgStyle::PlusPosition),
    ("nano", ArgStyle::PlusPosition),
    ("joe", ArgStyle::PlusPosition),
    ("micro", ArgStyle::PlusPosition),
    ("kak", ArgStyle::PlusPosition),
    ("mate", ArgStyle::LineOption),
    ("rmate", ArgStyle::LineOption),
    ("mine", ArgStyle::LineOption),
    ("notepad++", ArgStyle::NotepadPlusPlus),
];

/// Families whose UI lives in the invoking terminal rather than a window
const TERMINAL_FAMILIES: &[&str] = &[
    "vim", "vi", "nvim", "emacs", "nano", "joe", "micro", "hx", "helix", "kak",
];

impl ArgStyle {
    /// Style for a resolved editor command (path or bare name)
    pub fn for_command(command: &str) -> Self {
        let family = editor_family(command);
        FAMILIES
            .iter()
            .find(|(name, _)| *name == family)
            .map(|(_, style)| *style)
            .unwrap_or(ArgStyle::FileOnly)
    }
}

/// Normalised family name of a command: basename without executable
/// suffixes, lower-cased, JetBrains `64` suffix removed.
pub fn editor_family(command: &str) -> String {
    // Windows paths may reach us on any platform (WSL, configs)
    let basename = command
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(command)
        .to_ascii_lowercase();

    let mut family = basename.as_str();
    for suffix in [".exe", ".cmd", ".bat", ".sh"] {
        if let Some(stripped) = family.strip_suffix(suffix) {
            family = stripped;
            break;
        }
    }
    if let Some(stripped) = family.strip_suffix("64") {
        if FAMILIES.iter().any(|(name, _)| *name == stripped) {
            family = stripped;
        }
    }
    family.to_string()
}

/// Whether the editor occupies the terminal it is started from
pub fn is_terminal_editor(command: &str) -> bool {
    let family = editor_family(command);
    TERMINAL_FAMILIES.contains(&family.as_str())
}

/// Build the argument vector for opening `file` at `line`:`column`.
///
/// A user template always wins over the computed defaults. A non-positive
/// column is clamped to 1.
pub fn format_args(
    command: &str,
    file: &str,
    line: u32,
    column: i64,
    open_mode: OpenMode,
    workspace: Option<&Path>,
    template: Option<&PathFormat>,
) -> Vec<String> {
    let column = column.max(1);

    if let Some(template) = template {
        return apply_template(template, file, line, column);
    }

    let workspace = workspace.map(|w| w.to_string_lossy().into_owned());
    let position = format!("{file}:{line}:{column}");

    match ArgStyle::for_command(command) {
        ArgStyle::Combined => vec![position],
        ArgStyle::LineFlag => vec![
            format!("+call cursor({line}, {column})"),
            file.to_string(),
        ],
        ArgStyle::PlusPosition => vec![format!("+{line}:{column}"), file.to_string()],
        ArgStyle::LineOption => vec!["--line".to_string(), line.to_string(), file.to_string()],
        ArgStyle::WorkspaceLine => {
            let mut args: Vec<String> = workspace.into_iter().collect();
            args.extend(["--line".to_string(), line.to_string(), file.to_string()]);
            args
        }
        ArgStyle::MultiWindow => {
            let mut args: Vec<String> = workspace.into_iter().collect();
            args.push("-g".to_string());
            match open_mode {
                OpenMode::Reuse => args.push("-r".to_string()),
                OpenMode::New => args.push("-n".to_string()),
                OpenMode::Auto => {}
            }
            args.push(position);
            args
        }
        ArgStyle::NotepadPlusPlus => vec![
            format!("-n{line}"),
            format!("-c{column}"),
            file.to_string(),
        ],
        ArgStyle::FileOnly => vec![file.to_string()],
    }
}

fn apply_template(template: &PathFormat, file: &str, line: u32, column: i64) -> Vec<String> {
    let substitute = |token: &str| {
        token
            .replace("{file}", file)
            .replace("{line}", &line.to_string())
            .replace("{column}", &column.to_string())
    };
    match template {
        PathFormat::Single(token) => vec![substitute(token)],
        PathFormat::Tokens(tokens) => tokens.iter().map(|t| substitute(t)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &str, workspace: Option<&str>, mode: OpenMode) -> Vec<String> {
        format_args(
            command,
            "/a/b.ts",
            10,
            4,
            mode,
            workspace.map(Path::new),
            None,
        )
    }

    #[test]
    fn test_multi_window_plain() {
        assert_eq!(args("code", None, OpenMode::Auto), vec!["-g", "/a/b.ts:10:4"]);
    }

    #[test]
    fn test_multi_window_with_workspace_and_reuse() {
        assert_eq!(
            args("code", Some("/proj"), OpenMode::Reuse),
            vec!["/proj", "-g", "-r", "/a/b.ts:10:4"]
        );
        assert_eq!(
            args("cursor", None, OpenMode::New),
            vec!["-g", "-n", "/a/b.ts:10:4"]
        );
    }

    #[test]
    fn test_workspace_line() {
        assert_eq!(
            args("webstorm", Some("/proj"), OpenMode::Reuse),
            vec!["/proj", "--line", "10", "/a/b.ts"]
        );
        assert_eq!(
            args("idea64.exe", None, OpenMode::Auto),
            vec!["--line", "10", "/a/b.ts"]
        );
    }

    #[test]
    fn test_line_flag() {
        assert_eq!(
            args("vim", None, OpenMode::Auto),
            vec!["+call cursor(10, 4)", "/a/b.ts"]
        );
        assert_eq!(
            args("/usr/local/bin/nvim", Some("/proj"), OpenMode::New),
            vec!["+call cursor(10, 4)", "/a/b.ts"]
        );
    }

    #[test]
    fn test_other_styles() {
        assert_eq!(args("subl", None, OpenMode::Auto), vec!["/a/b.ts:10:4"]);
        assert_eq!(
            args("emacs", None, OpenMode::Auto),
            vec!["+10:4", "/a/b.ts"]
        );
        assert_eq!(
            args("rmate", None, OpenMode::Auto),
            vec!["--line", "10", "/a/b.ts"]
        );
        assert_eq!(
            args("C:\\Program Files\\Notepad++\\notepad++.exe", None, OpenMode::Auto),
            vec!["-n10", "-c4", "/a/b.ts"]
        );
    }

    #[test]
    fn test_unknown_family_gets_file_only() {
        assert_eq!(args("my-editor", Some("/proj"), OpenMode::Reuse), vec!["/a/b.ts"]);
    }

    #[test]
    fn test_column_clamped_to_one() {
        let result = format_args("code", "/a/b.ts", 3, 0, OpenMode::Auto, None, None);
        assert_eq!(result, vec!["-g", "/a/b.ts:3:1"]);
        let result = format_args("zed", "/a/b.ts", 3, -7, OpenMode::Auto, None, None);
        assert_eq!(result, vec!["/a/b.ts:3:1"]);
    }

    #[test]
    fn test_template_wins() {
        let single = PathFormat::Single("{file}#L{line}C{column}".to_string());
        assert_eq!(
            format_args("code", "/a/b.ts", 10, 4, OpenMode::Reuse, None, Some(&single)),
            vec!["/a/b.ts#L10C4"]
        );

        let tokens = PathFormat::Tokens(vec![
            "--goto".to_string(),
            "{file}:{line}".to_string(),
            "--col={column}".to_string(),
        ]);
        assert_eq!(
            format_args("my-editor", "/a/b.ts", 10, 4, OpenMode::Auto, None, Some(&tokens)),
            vec!["--goto", "/a/b.ts:10", "--col=4"]
        );
    }

    #[test]
    fn test_editor_family_normalisation() {
        assert_eq!(editor_family("/usr/bin/Code"), "code");
        assert_eq!(editor_family("C:\\JetBrains\\bin\\webstorm64.exe"), "webstorm");
        assert_eq!(editor_family("pycharm.sh"), "pycharm");
        assert_eq!(editor_family("notepad++.exe"), "notepad++");
    }

    #[test]
    fn test_terminal_editors() {
        assert!(is_terminal_editor("vim"));
        assert!(is_terminal_editor("/usr/bin/nvim"));
        assert!(is_terminal_editor("nano"));
        assert!(!is_terminal_editor("code"));
        assert!(!is_terminal_editor("gvim"));
    }
}
