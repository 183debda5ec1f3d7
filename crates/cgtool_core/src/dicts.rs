use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};

const OPENCC_URL: &str = "https://raw.githubusercontent.com/BYVoid/OpenCC/{commit}/data/dictionary/{file}";
const MEDIAWIKI_URL: &str =
    "https://raw.githubusercontent.com/wikimedia/mediawiki/{commit}/includes/languages/data/ZhConversion.php";

pub const OPENCC_FILES: [&str; 11] = [
    "HKVariants.txt",
    "HKVariantsRevPhrases.txt",
    "STCharacters.txt",
    "STPhrases.txt",
    "TSCharacters.txt",
    "TSPhrases.txt",
    "TWPhrasesIT.txt",
    "TWPhrasesName.txt",
    "TWPhrasesOther.txt",
    "TWVariants.txt",
    "TWVariantsRevPhrases.txt",
];

static REGEX_OPENCC_COMMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"const OPENCC_COMMIT[^"]+"([0-9a-fA-F]+)""#).expect("opencc commit regex")
});
static REGEX_MEDIAWIKI_COMMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"const MEDIAWIKI_COMMIT[^"]+"([0-9a-fA-F]+)""#).expect("mediawiki commit regex")
});

/// Commit pins for the upstream dictionary sources, read from the consumer's
/// `build.rs` so the sync always fetches exactly what the build expects.
#[derive(Debug, Clone)]
pub struct DictCommits {
    pub opencc: String,
    pub mediawiki: String,
}

pub fn read_commit_pins(build_rs_path: &Path) -> Result<DictCommits> {
    let build_rs = fs::read_to_string(build_rs_path)
        .with_context(|| format!("failed to read {}", build_rs_path.display()))?;
    let opencc = REGEX_OPENCC_COMMIT
        .captures(&build_rs)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| anyhow::anyhow!("OPENCC_COMMIT not found in build.rs"))?;
    let mediawiki = REGEX_MEDIAWIKI_COMMIT
        .captures(&build_rs)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| anyhow::anyhow!("MEDIAWIKI_COMMIT not found in build.rs"))?;
    Ok(DictCommits { opencc, mediawiki })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DictFileStatus {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct DictFileResult {
    pub name: String,
    pub status: DictFileStatus,
    pub sha256: String,
    pub previous_sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DictSyncReport {
    pub files: Vec<DictFileResult>,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Fetches the pinned OpenCC dictionaries and the MediaWiki conversion table
/// into `dest_dir`, recording per-file SHA-256 transitions. A single failed
/// download fails the whole sync; partial dictionary sets are worse than
/// stale ones.
pub fn sync_dicts(commits: &DictCommits, dest_dir: &Path) -> Result<DictSyncReport> {
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build dictionary HTTP client")?;
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("failed to create {}", dest_dir.display()))?;

    let mut targets = OPENCC_FILES
        .iter()
        .map(|file| {
            let url = OPENCC_URL
                .replace("{commit}", &commits.opencc)
                .replace("{file}", file);
            ((*file).to_string(), url)
        })
        .collect::<Vec<_>>();
    targets.push((
        "ZhConversion.php".to_string(),
        MEDIAWIKI_URL.replace("{commit}", &commits.mediawiki),
    ));

    let mut files = Vec::new();
    for (name, url) in targets {
        let body = fetch_raw_file(&client, &url)?;
        files.push(store_dict_file(&dest_dir.join(&name), &name, &body)?);
    }

    let created = count_status(&files, DictFileStatus::Created);
    let updated = count_status(&files, DictFileStatus::Updated);
    let unchanged = count_status(&files, DictFileStatus::Unchanged);
    Ok(DictSyncReport {
        files,
        created,
        updated,
        unchanged,
    })
}

fn fetch_raw_file(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to fetch {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("dictionary fetch failed with HTTP {status}: {url}");
    }
    let expected_len = response.content_length();
    let body = response
        .bytes()
        .with_context(|| format!("failed to read body of {url}"))?;
    if body.is_empty() {
        bail!("got empty file from {url}");
    }
    if let Some(expected) = expected_len
        && expected != body.len() as u64
    {
        bail!("incomplete download: {}/{} bytes from {url}", body.len(), expected);
    }
    Ok(body.to_vec())
}

fn store_dict_file(dest: &Path, name: &str, body: &[u8]) -> Result<DictFileResult> {
    let previous_sha256 = match fs::read(dest) {
        Ok(existing) => Some(sha256_hex(&existing)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", dest.display()));
        }
    };

    let sha256 = sha256_hex(body);
    let status = match &previous_sha256 {
        None => DictFileStatus::Created,
        Some(previous) if *previous == sha256 => DictFileStatus::Unchanged,
        Some(_) => DictFileStatus::Updated,
    };
    if status != DictFileStatus::Unchanged {
        fs::write(dest, body).with_context(|| format!("failed to write {}", dest.display()))?;
    }

    Ok(DictFileResult {
        name: name.to_string(),
        status,
        sha256,
        previous_sha256,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn count_status(files: &[DictFileResult], status: DictFileStatus) -> usize {
    files.iter().filter(|file| file.status == status).count()
}
