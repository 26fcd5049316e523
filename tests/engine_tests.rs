//! Full-engine scenarios over temporary trees.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::TempDir;

use common::{read, write_tree};
use source_rewriter::prelude::*;

fn literal(id: &str, needle: &str, replacement: &str) -> Rule {
    Rule::new(
        id,
        Matcher::literal(needle).unwrap(),
        Replacement::Literal(replacement.to_string()),
    )
    .unwrap()
}

fn a_to_b() -> RuleSet {
    RuleSet::new(vec![literal("a-to-b", "from '../a/", "from '../b/")]).unwrap()
}

fn request(root: &Path, rules: RuleSet) -> RunRequest {
    RunRequest::new(
        root,
        rules,
        [".ts", ".tsx"],
        ["node_modules", ".git", "dist", "build"],
    )
}

fn pin_mtime(path: &Path) -> FileTime {
    let old = FileTime::from_unix_time(1_000_000_000, 0);
    filetime::set_file_mtime(path, old).unwrap();
    old
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap())
}

#[test]
fn matching_import_is_relocated() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("x.ts", "import x from '../a/mod';")]);

    let summary = run(request(tmp.path(), a_to_b())).unwrap();

    assert_eq!(read(tmp.path(), "x.ts"), "import x from '../b/mod';");
    assert_eq!(summary.hits_for("a-to-b"), 1);
    assert_eq!(summary.files_modified(), 1);
    assert_eq!(summary.modified_files()[0].path, PathBuf::from("x.ts"));
    assert_eq!(summary.modified_files()[0].hits["a-to-b"], 1);
}

#[test]
fn non_matching_file_is_byte_identical_and_untouched() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("y.ts", "import y from '../c/mod';")]);
    let path = tmp.path().join("y.ts");
    let pinned = pin_mtime(&path);

    let summary = run(request(tmp.path(), a_to_b())).unwrap();

    assert_eq!(read(tmp.path(), "y.ts"), "import y from '../c/mod';");
    assert_eq!(mtime(&path), pinned);
    assert_eq!(summary.hits_for("a-to-b"), 0);
    assert_eq!(summary.files_modified(), 0);
    assert_eq!(summary.total_files_scanned(), 1);
}

#[test]
fn rule_that_matches_but_changes_nothing_does_not_write() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("same.ts", "keep this")]);
    let path = tmp.path().join("same.ts");
    let pinned = pin_mtime(&path);

    let rules = RuleSet::new(vec![literal("noop", "keep", "keep")]).unwrap();
    let summary = run(request(tmp.path(), rules)).unwrap();

    assert_eq!(summary.hits_for("noop"), 1);
    assert_eq!(summary.files_modified(), 0);
    assert_eq!(mtime(&path), pinned);
}

#[test]
fn obsolete_file_is_deleted_once() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("obsolete.ext", "gone soon"), ("keep.ts", "x")]);

    let first = run(
        request(tmp.path(), a_to_b()).with_deletion(DeletionSpec::new(["obsolete.ext"])),
    )
    .unwrap();
    assert!(!tmp.path().join("obsolete.ext").exists());
    assert_eq!(first.deleted_paths(), &[PathBuf::from("obsolete.ext")]);

    let second = run(
        request(tmp.path(), a_to_b()).with_deletion(DeletionSpec::new(["obsolete.ext"])),
    )
    .unwrap();
    assert!(second.deleted_paths().is_empty());
    assert!(second.errors().is_empty());
}

#[test]
fn deleted_candidate_is_never_scanned() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("components/BombaCard.tsx", "import x from '../a/mod';"),
            ("components/PumpCard.tsx", "import x from '../a/mod';"),
        ],
    );

    for dry_run in [true, false] {
        let summary = run(request(tmp.path(), a_to_b())
            .with_deletion(DeletionSpec::new(["components/BombaCard.tsx"]))
            .with_dry_run(dry_run))
        .unwrap();

        assert!(
            summary
                .modified_files()
                .iter()
                .all(|file| file.path != Path::new("components/BombaCard.tsx")),
            "deleted file was rewritten (dry_run={dry_run})"
        );
        if dry_run {
            assert_eq!(summary.total_files_scanned(), 1);
        }
    }
    assert!(!tmp.path().join("components/BombaCard.tsx").exists());
}

#[test]
fn excluded_directories_are_never_touched() {
    let tmp = TempDir::new().unwrap();
    let dependency = "import d from '../a/mod';";
    write_tree(
        tmp.path(),
        &[
            ("src/app.ts", "import a from '../a/mod';"),
            ("node_modules/dep/index.ts", dependency),
            ("dist/app.ts", dependency),
            (".git/hooks/x.ts", dependency),
        ],
    );

    let summary = run(request(tmp.path(), a_to_b())
        .with_deletion(DeletionSpec::new(["dist/app.ts"])))
    .unwrap();

    let modified: Vec<&Path> = summary.modified_files().iter().map(|f| f.path.as_path()).collect();
    assert_eq!(modified, vec![Path::new("src/app.ts")]);
    assert!(summary.deleted_paths().is_empty());
    assert_eq!(summary.errors()[0].code, "SRW-2004");
    for rel in ["node_modules/dep/index.ts", "dist/app.ts", ".git/hooks/x.ts"] {
        assert_eq!(read(tmp.path(), rel), dependency, "{rel} changed");
    }
}

#[test]
fn rules_apply_in_declared_order() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("chain.ts", "A")]);

    let forward = RuleSet::new(vec![literal("r1", "A", "B"), literal("r2", "B", "C")]).unwrap();
    let summary = run(request(tmp.path(), forward)).unwrap();
    assert_eq!(read(tmp.path(), "chain.ts"), "C");
    assert_eq!(summary.hits_for("r1"), 1);
    assert_eq!(summary.hits_for("r2"), 1);

    fs::write(tmp.path().join("chain.ts"), "A").unwrap();
    let reversed = RuleSet::new(vec![literal("r2", "B", "C"), literal("r1", "A", "B")]).unwrap();
    run(request(tmp.path(), reversed)).unwrap();
    assert_eq!(read(tmp.path(), "chain.ts"), "B");
}

#[test]
fn declaration_files_are_skipped_by_suffix() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("types/env.d.ts", "import x from '../a/mod';"),
            ("types/env.ts", "import x from '../a/mod';"),
        ],
    );

    let mut req = request(tmp.path(), a_to_b());
    req.excluded_suffixes = vec![".d.ts".to_string()];
    let summary = run(req).unwrap();

    assert_eq!(summary.total_files_scanned(), 1);
    assert_eq!(read(tmp.path(), "types/env.d.ts"), "import x from '../a/mod';");
}

const MIGRATION: &str = r#"
[[rules]]
kind = "import_relocation"
id = "api-client"
description = "lib/api moved to lib/api-client"
from = "lib/api"
to = "lib/api-client"
depths = [1, 2]

[[rules]]
kind = "closed_set"
id = "company-enum"
call = "z.enum"
remove = ["felixmix", "worldrental"]
default = "worldpav"
empty_replacement = "z.string()"

[[rules]]
kind = "block"
id = "drop-bomba-interface"
start = "export interface BombaOption"

[[rules]]
kind = "marked"
id = "drop-next-bomba"
start = '\{/\*\s*Próxima Bomba'
end = "</div>"
"#;

const SCHEMA_BEFORE: &str = "import { api } from '../lib/api';
import { z } from 'zod';
export interface BombaOption {
  id: string;
}
const schema = z.object({ company: z.enum(['worldpav', 'felixmix']).optional() });
const c = company || 'felixmix';
";

const SCHEMA_AFTER: &str = "import { api } from '../lib/api-client';
import { z } from 'zod';

const schema = z.object({ company: z.enum(['worldpav']).optional() });
const c = company || 'worldpav';
";

fn migration_request(root: &Path) -> RunRequest {
    let mut config = Config::from_toml(MIGRATION).unwrap();
    config.engine.root = root.to_path_buf();
    config.validate().unwrap();
    RunRequest::from_config(&config).unwrap()
}

#[test]
fn configured_migration_rewrites_tree() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("src/schema.ts", SCHEMA_BEFORE),
            ("src/Page.tsx", "<main>{/* Próxima Bomba */}<div>x</div>\n<div>keep</div></main>\n"),
        ],
    );

    let summary = run(migration_request(tmp.path())).unwrap();

    assert_eq!(read(tmp.path(), "src/schema.ts"), SCHEMA_AFTER);
    assert_eq!(
        read(tmp.path(), "src/Page.tsx"),
        "<main>\n<div>keep</div></main>\n"
    );
    assert_eq!(summary.hits_for("api-client"), 1);
    assert_eq!(summary.hits_for("company-enum"), 2);
    assert_eq!(summary.hits_for("drop-bomba-interface"), 1);
    assert_eq!(summary.hits_for("drop-next-bomba"), 1);
    assert!(summary.is_clean());
}

#[test]
fn second_run_of_converged_tree_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("src/schema.ts", SCHEMA_BEFORE)]);

    let first = run(migration_request(tmp.path())).unwrap();
    assert_eq!(first.files_modified(), 1);

    let second = run(migration_request(tmp.path())).unwrap();
    assert_eq!(second.files_modified(), 0);
    assert_eq!(read(tmp.path(), "src/schema.ts"), SCHEMA_AFTER);
}

#[test]
fn broken_rule_is_disabled_and_others_still_run() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("a.ts", "import x from '../a/mod';")]);

    let mut config = Config::from_toml(
        r#"
        [[rules]]
        kind = "regex"
        id = "broken"
        pattern = "("

        [[rules]]
        kind = "literal"
        id = "a-to-b"
        needle = "from '../a/"
        replacement = "from '../b/"
        "#,
    )
    .unwrap();
    config.engine.root = tmp.path().to_path_buf();

    let summary = run(RunRequest::from_config(&config).unwrap()).unwrap();

    assert_eq!(read(tmp.path(), "a.ts"), "import x from '../b/mod';");
    assert_eq!(summary.rule_errors().len(), 1);
    assert_eq!(summary.rule_errors()[0].rule_id, "broken");
    assert!(summary.rule_errors()[0].path.is_none());
}

#[test]
fn unbalanced_block_fails_rule_for_that_file_only() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("bad.ts", "export interface BombaOption {\n  id: string;\n"),
            ("good.ts", "export interface BombaOption {\n  id: string;\n}\nkeep\n"),
        ],
    );

    let summary = run(migration_request(tmp.path())).unwrap();

    assert_eq!(read(tmp.path(), "bad.ts"), "export interface BombaOption {\n  id: string;\n");
    assert_eq!(read(tmp.path(), "good.ts"), "\nkeep\n");
    assert_eq!(summary.rule_errors().len(), 1);
    assert_eq!(summary.rule_errors()[0].path, Some(PathBuf::from("bad.ts")));
    assert_eq!(summary.files_modified(), 1);
}

#[test]
fn bundled_demo_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/config.toml");
    let config = Config::load_with_env(Some(&path), |_| None).unwrap();
    let rules = RuleSet::from_specs(&config.rules).unwrap();
    assert!(rules.disabled().is_empty(), "{:?}", rules.disabled());
    assert_eq!(rules.len(), config.rules.len());
    assert_eq!(config.deletion.paths.len(), 2);
}
