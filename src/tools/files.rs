//! 沙箱文件检索工具
//!
//! SafeFs 绑定根目录，所有路径经 resolve 校验必须在根下（禁止 ../ 逃逸）；
//! find_files / count_files / search_assets / find_scripts 都基于 SafeFs + walkdir。

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::tools::{ArgValue, ParamSpec, ParamType, ToolArgs, ToolCapability};

const COUNT_SAMPLE_LIMIT: usize = 5;
const ASSET_LIST_LIMIT: usize = 20;
const MAX_SCRIPT_BYTES: u64 = 1024 * 1024;
const MAX_WALK_DEPTH: usize = 32;

const SCRIPT_EXTENSIONS: &[&str] = &["rs", "py", "cs", "js", "ts", "go", "java", "c", "cpp", "h", "sh", "lua"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];
const DOCUMENT_EXTENSIONS: &[&str] = &["md", "txt", "pdf", "rst", "html"];
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json", "ini"];

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Ok(None) 表示路径不存在；逃逸出根目录返回 Err
    pub fn resolve(&self, path: &str) -> Result<Option<PathBuf>, String> {
        let trimmed = path.trim().trim_start_matches("./");
        let full = if trimmed.is_empty() || trimmed == "." {
            self.root_dir.clone()
        } else {
            self.root_dir.join(trimmed)
        };
        let canonical = match full.canonicalize() {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        if canonical.starts_with(&self.root_dir) {
            Ok(Some(canonical))
        } else {
            Err(format!("access denied: '{path}' is outside the workspace root"))
        }
    }

    /// 相对根目录的路径，统一用 `/`
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// 遍历 base 下的文件（跳过隐藏目录、target、node_modules）
    fn walk(&self, base: &Path, recursive: bool) -> impl Iterator<Item = DirEntry> {
        let depth = if recursive { MAX_WALK_DEPTH } else { 1 };
        WalkDir::new(base)
            .max_depth(depth)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && name != "target" && name != "node_modules"
            })
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
    }
}

fn compile_patterns(file_pattern: &str) -> Result<Vec<glob::Pattern>, String> {
    file_pattern
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| glob::Pattern::new(p).map_err(|e| format!("invalid file pattern '{p}': {e}")))
        .collect()
}

fn file_name(entry: &DirEntry) -> String {
    entry.file_name().to_string_lossy().to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

fn name_matches(path: &Path, name_pattern: &str) -> bool {
    name_pattern == "*" || name_pattern.is_empty() || file_stem(path).contains(name_pattern)
}

fn search_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::with_default("path", ParamType::String, ArgValue::Str(".".into())),
        ParamSpec::with_default("file_pattern", ParamType::String, ArgValue::Str("*".into())),
        ParamSpec::with_default("recursive", ParamType::Boolean, ArgValue::Bool(false)),
    ]
}

/// 收集匹配 file_pattern 的文件；路径不存在时返回 Ok(None)
fn collect_matches(fs: &SafeFs, args: &ToolArgs) -> Result<Option<Vec<DirEntry>>, String> {
    let path = args.str("path").unwrap_or(".");
    let patterns = compile_patterns(args.str("file_pattern").unwrap_or("*"))?;
    let recursive = args.bool("recursive").unwrap_or(false);

    let Some(base) = fs.resolve(path)? else {
        return Ok(None);
    };
    let entries = fs
        .walk(&base, recursive)
        .filter(|e| {
            let name = file_name(e);
            patterns.iter().any(|p| p.matches(&name))
        })
        .collect();
    Ok(Some(entries))
}

/// find_files：列出匹配模式的文件（按文件名排序）
pub struct FindFilesTool {
    fs: SafeFs,
}

impl FindFilesTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { fs: SafeFs::new(root) }
    }
}

impl ToolCapability for FindFilesTool {
    fn description(&self) -> &str {
        "Find files under a path that match a glob pattern (comma-separated globs allowed) and list their names and paths"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        search_params()
    }

    fn invoke(&self, args: &ToolArgs) -> Result<String, String> {
        let Some(mut entries) = collect_matches(&self.fs, args)? else {
            return Ok(format!("path does not exist: {}", args.str("path").unwrap_or(".")));
        };
        entries.sort_by_key(file_name);

        let lines: Vec<String> = entries
            .iter()
            .map(|e| format!("name: {}, path: {}", file_name(e), self.fs.relative(e.path())))
            .collect();
        Ok(format!("found {} files:\n{}", lines.len(), lines.join("\n")))
    }
}

/// count_files：统计匹配模式的文件数量，附最多 5 个示例
pub struct CountFilesTool {
    fs: SafeFs,
}

impl CountFilesTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { fs: SafeFs::new(root) }
    }
}

impl ToolCapability for CountFilesTool {
    fn description(&self) -> &str {
        "Count the files under a path that match a glob pattern"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        search_params()
    }

    fn invoke(&self, args: &ToolArgs) -> Result<String, String> {
        let path = args.str("path").unwrap_or(".");
        let Some(mut entries) = collect_matches(&self.fs, args)? else {
            return Ok(format!("path does not exist: {path}"));
        };
        entries.sort_by_key(|e| e.path().to_path_buf());

        let mut out = format!(
            "count result:\ntotal: {}\npath: {}\npattern: {}\n",
            entries.len(),
            path,
            args.str("file_pattern").unwrap_or("*")
        );
        if !entries.is_empty() {
            let samples: Vec<String> = entries
                .iter()
                .take(COUNT_SAMPLE_LIMIT)
                .map(|e| self.fs.relative(e.path()))
                .collect();
            out.push_str("sample files:\n");
            out.push_str(&samples.join("\n"));
        }
        Ok(out)
    }
}

/// search_assets：按资源类别（script / image / audio / document / config / all）递归搜索
pub struct SearchAssetsTool {
    fs: SafeFs,
}

impl SearchAssetsTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { fs: SafeFs::new(root) }
    }

    fn extensions(asset_type: &str) -> Result<Option<&'static [&'static str]>, String> {
        match asset_type.trim().to_lowercase().as_str() {
            "all" | "" => Ok(None),
            "script" | "code" => Ok(Some(SCRIPT_EXTENSIONS)),
            "image" | "texture" => Ok(Some(IMAGE_EXTENSIONS)),
            "audio" => Ok(Some(AUDIO_EXTENSIONS)),
            "document" | "doc" => Ok(Some(DOCUMENT_EXTENSIONS)),
            "config" => Ok(Some(CONFIG_EXTENSIONS)),
            other => Err(format!(
                "unknown asset_type '{other}' (expected script, image, audio, document, config or all)"
            )),
        }
    }
}

impl ToolCapability for SearchAssetsTool {
    fn description(&self) -> &str {
        "Search the whole workspace for assets of a type (script, image, audio, document, config, all) whose name contains name_pattern"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("asset_type", ParamType::String, ArgValue::Str("all".into())),
            ParamSpec::with_default("name_pattern", ParamType::String, ArgValue::Str("*".into())),
        ]
    }

    fn invoke(&self, args: &ToolArgs) -> Result<String, String> {
        let asset_type = args.str("asset_type").unwrap_or("all");
        let name_pattern = args.str("name_pattern").unwrap_or("*");
        let extensions = Self::extensions(asset_type)?;

        let mut results: Vec<String> = self
            .fs
            .walk(self.fs.root(), true)
            .filter(|e| extensions.map_or(true, |exts| has_extension(e.path(), exts)))
            .filter(|e| name_matches(e.path(), name_pattern))
            .map(|e| self.fs.relative(e.path()))
            .collect();
        results.sort();

        let shown: Vec<&str> = results.iter().take(ASSET_LIST_LIMIT).map(String::as_str).collect();
        Ok(format!(
            "found {} {} assets:\n{}",
            results.len(),
            asset_type,
            shown.join("\n")
        ))
    }
}

/// find_scripts：文件名包含 name_pattern 且内容包含 content_pattern 的脚本
pub struct FindScriptsTool {
    fs: SafeFs,
}

impl FindScriptsTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { fs: SafeFs::new(root) }
    }
}

impl ToolCapability for FindScriptsTool {
    fn description(&self) -> &str {
        "Find script files whose name contains name_pattern and whose contents contain content_pattern"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("content_pattern", ParamType::String, ArgValue::Str(String::new())),
            ParamSpec::with_default("name_pattern", ParamType::String, ArgValue::Str("*".into())),
        ]
    }

    fn invoke(&self, args: &ToolArgs) -> Result<String, String> {
        let content_pattern = args.str("content_pattern").unwrap_or("");
        let name_pattern = args.str("name_pattern").unwrap_or("*");

        let mut results: Vec<String> = self
            .fs
            .walk(self.fs.root(), true)
            .filter(|e| has_extension(e.path(), SCRIPT_EXTENSIONS))
            .filter(|e| name_matches(e.path(), name_pattern))
            .filter(|e| {
                if content_pattern.is_empty() {
                    return true;
                }
                if e.metadata().map(|m| m.len() > MAX_SCRIPT_BYTES).unwrap_or(true) {
                    return false;
                }
                std::fs::read_to_string(e.path())
                    .map(|c| c.contains(content_pattern))
                    .unwrap_or(false)
            })
            .map(|e| self.fs.relative(e.path()))
            .collect();
        results.sort();

        Ok(format!(
            "found {} script files:\n{}",
            results.len(),
            results.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join("assets")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("README.md"), "# demo").unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() { run_player(); }").unwrap();
        std::fs::write(root.join("src/player.rs"), "pub fn run_player() {}").unwrap();
        std::fs::write(root.join("src/nested/enemy.rs"), "pub struct Enemy;").unwrap();
        std::fs::write(root.join("assets/player.png"), [0u8; 4]).unwrap();
        std::fs::write(root.join(".git/config.rs"), "hidden").unwrap();
        dir
    }

    fn args(pairs: &[(&str, ArgValue)]) -> ToolArgs {
        let mut a = ToolArgs::new();
        for (k, v) in pairs {
            a.insert(*k, v.clone());
        }
        a
    }

    #[test]
    fn test_resolve_blocks_escape() {
        let dir = workspace();
        let fs = SafeFs::new(dir.path());
        assert!(fs.resolve("src").unwrap().is_some());
        assert!(fs.resolve("missing").unwrap().is_none());
        assert!(fs.resolve("../").is_err());
    }

    #[test]
    fn test_find_files_non_recursive() {
        let dir = workspace();
        let tool = FindFilesTool::new(dir.path());
        let out = tool
            .invoke(&args(&[
                ("path", ArgValue::Str("src".into())),
                ("file_pattern", ArgValue::Str("*.rs".into())),
            ]))
            .unwrap();
        assert!(out.starts_with("found 2 files:"), "{out}");
        assert!(out.contains("path: src/main.rs"));
        assert!(!out.contains("enemy.rs"));
    }

    #[test]
    fn test_find_files_recursive_multi_pattern() {
        let dir = workspace();
        let tool = FindFilesTool::new(dir.path());
        let out = tool
            .invoke(&args(&[
                ("path", ArgValue::Str(".".into())),
                ("file_pattern", ArgValue::Str("*.rs, *.md".into())),
                ("recursive", ArgValue::Bool(true)),
            ]))
            .unwrap();
        assert!(out.starts_with("found 4 files:"), "{out}");
        assert!(!out.contains(".git"));
    }

    #[test]
    fn test_count_files_samples() {
        let dir = workspace();
        let tool = CountFilesTool::new(dir.path());
        let out = tool
            .invoke(&args(&[
                ("path", ArgValue::Str(".".into())),
                ("file_pattern", ArgValue::Str("*.rs".into())),
                ("recursive", ArgValue::Bool(true)),
            ]))
            .unwrap();
        assert!(out.contains("total: 3"), "{out}");
        assert!(out.contains("sample files:"));
    }

    #[test]
    fn test_missing_path_is_observation_not_error() {
        let dir = workspace();
        let tool = CountFilesTool::new(dir.path());
        let out = tool
            .invoke(&args(&[("path", ArgValue::Str("nowhere".into()))]))
            .unwrap();
        assert_eq!(out, "path does not exist: nowhere");
    }

    #[test]
    fn test_escape_is_error() {
        let dir = workspace();
        let tool = FindFilesTool::new(dir.path().join("src"));
        assert!(tool
            .invoke(&args(&[("path", ArgValue::Str("..".into()))]))
            .is_err());
    }

    #[test]
    fn test_search_assets_by_type_and_name() {
        let dir = workspace();
        let tool = SearchAssetsTool::new(dir.path());
        let out = tool
            .invoke(&args(&[
                ("asset_type", ArgValue::Str("script".into())),
                ("name_pattern", ArgValue::Str("play".into())),
            ]))
            .unwrap();
        assert!(out.starts_with("found 1 script assets:"), "{out}");
        assert!(out.contains("src/player.rs"));

        let images = tool
            .invoke(&args(&[("asset_type", ArgValue::Str("image".into()))]))
            .unwrap();
        assert!(images.contains("assets/player.png"));

        assert!(tool
            .invoke(&args(&[("asset_type", ArgValue::Str("hologram".into()))]))
            .is_err());
    }

    #[test]
    fn test_find_scripts_by_content() {
        let dir = workspace();
        let tool = FindScriptsTool::new(dir.path());
        let out = tool
            .invoke(&args(&[("content_pattern", ArgValue::Str("run_player".into()))]))
            .unwrap();
        assert!(out.starts_with("found 2 script files:"), "{out}");
        assert!(out.contains("src/main.rs"));
        assert!(out.contains("src/player.rs"));
    }
}
