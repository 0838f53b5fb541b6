//! Supported editors and how to recognise a running instance.
//!
//! The table order is a priority list: when several editors are running the
//! first entry found in the process listing wins.

use super::Platform;

/// A process pattern and the command that drives the matching editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMatch {
    /// Substring searched for in the process listing
    pub pattern: &'static str,
    /// Command used to open files in the running editor
    pub command: &'static str,
}

const fn m(pattern: &'static str, command: &'static str) -> ProcessMatch {
    ProcessMatch { pattern, command }
}

/// Static description of one editor family
#[derive(Debug, PartialEq, Eq)]
pub struct EditorDescriptor {
    /// Stable identifier accepted in overrides (e.g. `code`)
    pub id: &'static str,
    /// Other names accepted in overrides
    pub aliases: &'static [&'static str],
    pub macos: &'static [ProcessMatch],
    pub linux: &'static [ProcessMatch],
    pub windows: &'static [ProcessMatch],
}

impl EditorDescriptor {
    /// Process matches for a platform
    pub fn matches(&self, platform: Platform) -> &'static [ProcessMatch] {
        match platform {
            Platform::MacOs => self.macos,
            Platform::Linux => self.linux,
            Platform::Windows => self.windows,
        }
    }

    /// Command used when the editor is named explicitly, without scanning.
    /// `None` if the editor does not exist on this platform.
    pub fn command(&self, platform: Platform) -> Option<&'static str> {
        self.matches(platform).first().map(|m| m.command)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.id.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

/// Look up a descriptor by id or alias (case-insensitive)
pub fn find_descriptor(name: &str) -> Option<&'static EditorDescriptor> {
    let name = name.trim();
    EDITORS.iter().find(|editor| editor.is_named(name))
}

pub static EDITORS: &[EditorDescriptor] = &[
    EditorDescriptor {
        id: "code",
        aliases: &["vscode", "vs-code"],
        macos: &[
            m(
                "/Visual Studio Code.app/Contents/MacOS/Electron",
                "/Applications/Visual Studio Code.app/Contents/Resources/app/bin/code",
            ),
            m(
                "/Visual Studio Code.app/Contents/MacOS/Code",
                "/Applications/Visual Studio Code.app/Contents/Resources/app/bin/code",
            ),
        ],
        linux: &[m("code", "code")],
        windows: &[m("Code.exe", "code")],
    },
    EditorDescriptor {
        id: "code-insiders",
        aliases: &["vscode-insiders"],
        macos: &[m(
            "/Visual Studio Code - Insiders.app/Contents/MacOS/Electron",
            "/Applications/Visual Studio Code - Insiders.app/Contents/Resources/app/bin/code",
        )],
        linux: &[m("code-insiders", "code-insiders")],
        windows: &[m("Code - Insiders.exe", "code-insiders")],
    },
    EditorDescriptor {
        id: "cursor",
        aliases: &[],
        macos: &[m(
            "/Cursor.app/Contents/MacOS/Cursor",
            "/Applications/Cursor.app/Contents/Resources/app/bin/cursor",
        )],
        linux: &[m("cursor", "cursor")],
        windows: &[m("Cursor.exe", "cursor")],
    },
    EditorDescriptor {
        id: "windsurf",
        aliases: &[],
        macos: &[m(
            "/Windsurf.app/Contents/MacOS/Electron",
            "/Applications/Windsurf.app/Contents/Resources/app/bin/windsurf",
        )],
        linux: &[m("windsurf", "windsurf")],
        windows: &[m("Windsurf.exe", "windsurf")],
    },
    EditorDescriptor {
        id: "trae",
        aliases: &[],
        macos: &[m(
            "/Trae.app/Contents/MacOS/Electron",
            "/Applications/Trae.app/Contents/Resources/app/bin/trae",
        )],
        linux: &[],
        windows: &[m("Trae.exe", "trae")],
    },
    EditorDescriptor {
        id: "codium",
        aliases: &["vscodium"],
        macos: &[m(
            "/VSCodium.app/Contents/MacOS/Electron",
            "/Applications/VSCodium.app/Contents/Resources/app/bin/codium",
        )],
        linux: &[m("codium", "codium"), m("vscodium", "vscodium")],
        windows: &[m("VSCodium.exe", "codium")],
    },
    EditorDescriptor {
        id: "webstorm",
        aliases: &[],
        macos: &[m(
            "/WebStorm.app/Contents/MacOS/webstorm",
            "/Applications/WebStorm.app/Contents/MacOS/webstorm",
        )],
        linux: &[m("webstorm.sh", "webstorm")],
        windows: &[m("webstorm64.exe", "webstorm64.exe"), m("webstorm.exe", "webstorm.exe")],
    },
    EditorDescriptor {
        id: "idea",
        aliases: &["intellij"],
        macos: &[
            m(
                "/IntelliJ IDEA.app/Contents/MacOS/idea",
                "/Applications/IntelliJ IDEA.app/Contents/MacOS/idea",
            ),
            m(
                "/IntelliJ IDEA CE.app/Contents/MacOS/idea",
                "/Applications/IntelliJ IDEA CE.app/Contents/MacOS/idea",
            ),
        ],
        linux: &[m("idea.sh", "idea")],
        windows: &[m("idea64.exe", "idea64.exe"), m("idea.exe", "idea.exe")],
    },
    EditorDescriptor {
        id: "phpstorm",
        aliases: &[],
        macos: &[m(
            "/PhpStorm.app/Contents/MacOS/phpstorm",
            "/Applications/PhpStorm.app/Contents/MacOS/phpstorm",
        )],
        linux: &[m("phpstorm.sh", "phpstorm")],
        windows: &[m("phpstorm64.exe", "phpstorm64.exe"), m("phpstorm.exe", "phpstorm.exe")],
    },
    EditorDescriptor {
        id: "pycharm",
        aliases: &[],
        macos: &[
            m(
                "/PyCharm.app/Contents/MacOS/pycharm",
                "/Applications/PyCharm.app/Contents/MacOS/pycharm",
            ),
            m(
                "/PyCharm CE.app/Contents/MacOS/pycharm",
                "/Applications/PyCharm CE.app/Contents/MacOS/pycharm",
            ),
        ],
        linux: &[m("pycharm.sh", "pycharm")],
        windows: &[m("pycharm64.exe", "pycharm64.exe"), m("pycharm.exe", "pycharm.exe")],
    },
    EditorDescriptor {
        id: "goland",
        aliases: &[],
        macos: &[m(
            "/GoLand.app/Contents/MacOS/goland",
            "/Applications/GoLand.app/Contents/MacOS/goland",
        )],
        linux: &[m("goland.sh", "goland")],
        windows: &[m("goland64.exe", "goland64.exe"), m("goland.exe", "goland.exe")],
    },
    EditorDescriptor {
        id: "rider",
        aliases: &[],
        macos: &[m(
            "/Rider.app/Contents/MacOS/rider",
            "/Applications/Rider.app/Contents/MacOS/rider",
        )],
        linux: &[m("rider.sh", "rider")],
        windows: &[m("rider64.exe", "rider64.exe")],
    },
    EditorDescriptor {
        id: "rustrover",
        aliases: &[],
        macos: &[m(
            "/RustRover.app/Contents/MacOS/rustrover",
            "/Applications/RustRover.app/Contents/MacOS/rustrover",
        )],
        linux: &[m("rustrover.sh", "rustrover")],
        windows: &[m("rustrover64.exe", "rustrover64.exe")],
    },
    EditorDescriptor {
        id: "appcode",
        aliases: &[],
        macos: &[m(
            "/AppCode.app/Contents/MacOS/appcode",
            "/Applications/AppCode.app/Contents/MacOS/appcode",
        )],
        linux: &[],
        windows: &[],
    },
    EditorDescriptor {
        id: "zed",
        aliases: &[],
        macos: &[m("/Zed.app/Contents/MacOS/zed", "zed")],
        linux: &[m("zed-editor", "zeditor"), m("zeditor", "zeditor")],
        windows: &[m("Zed.exe", "zed")],
    },
    EditorDescriptor {
        id: "subl",
        aliases: &["sublime", "sublime_text"],
        macos: &[m(
            "/Sublime Text.app/Contents/MacOS/Sublime Text",
            "/Applications/Sublime Text.app/Contents/SharedSupport/bin/subl",
        )],
        linux: &[m("sublime_text", "subl")],
        windows: &[m("sublime_text.exe", "sublime_text.exe")],
    },
    EditorDescriptor {
        id: "atom",
        aliases: &[],
        macos: &[m("/Atom.app/Contents/MacOS/Atom", "atom")],
        linux: &[m("atom", "atom")],
        windows: &[m("atom.exe", "atom.exe")],
    },
    EditorDescriptor {
        id: "notepad++",
        aliases: &["notepadplusplus"],
        macos: &[],
        linux: &[],
        windows: &[m("notepad++.exe", "notepad++.exe")],
    },
    EditorDescriptor {
        id: "mvim",
        aliases: &["macvim"],
        macos: &[m("/MacVim.app/Contents/MacOS/MacVim", "mvim")],
        linux: &[],
        windows: &[],
    },
    EditorDescriptor {
        id: "gvim",
        aliases: &[],
        macos: &[],
        linux: &[m("gvim", "gvim")],
        windows: &[m("gvim.exe", "gvim.exe")],
    },
    EditorDescriptor {
        id: "nvim",
        aliases: &["neovim"],
        macos: &[m("nvim", "nvim")],
        linux: &[m("nvim", "nvim")],
        windows: &[m("nvim.exe", "nvim")],
    },
    EditorDescriptor {
        id: "vim",
        aliases: &[],
        macos: &[m("vim", "vim")],
        linux: &[m("vim", "vim")],
        windows: &[m("vim.exe", "vim")],
    },
    EditorDescriptor {
        id: "emacs",
        aliases: &[],
        macos: &[m("/Emacs.app/Contents/MacOS/Emacs", "emacs"), m("emacs", "emacs")],
        linux: &[m("emacs", "emacs")],
        windows: &[m("emacs.exe", "emacs")],
    },
];
