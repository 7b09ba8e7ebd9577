use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Columns a catalog CSV must carry; other columns are ignored.
const CSV_COLUMNS: [&str; 3] = ["skill", "company", "package"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub package: String,
}

/// Skill (lower-cased) to the companies hiring for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SkillCatalog {
    skills: BTreeMap<String, Vec<Company>>,
}

/// Either `{"Companies": [...]}` or a bare company list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SkillEntry {
    Wrapped {
        #[serde(rename = "Companies")]
        companies: Vec<Company>,
    },
    Bare(Vec<Company>),
}

/// One `skill,company,package` line of the catalog CSV.
#[derive(Deserialize)]
struct SkillRow {
    skill: String,
    company: String,
    package: String,
}

impl SkillCatalog {
    /// Reads `skill,company,package` rows. A file without all three columns yields
    /// an empty catalog; rows that cannot be read or have no skill are skipped.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if !CSV_COLUMNS.iter().all(|col| headers.iter().any(|h| h == *col)) {
            warn!("Skill CSV lacks one of the columns {}", CSV_COLUMNS.join(", "));
            return Ok(Self::default());
        }

        let mut skills: BTreeMap<String, Vec<Company>> = BTreeMap::new();
        for (line, row) in reader.deserialize::<SkillRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    debug!("Skipping skill CSV row {}: {e}", line + 2);
                    continue;
                }
            };
            let skill = normalize_skill(&row.skill);
            if skill.is_empty() {
                continue;
            }
            skills.entry(skill).or_default().push(Company {
                name: row.company,
                package: row.package,
            });
        }
        Ok(Self { skills })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, SkillEntry> = serde_json::from_str(text)?;
        let mut skills: BTreeMap<String, Vec<Company>> = BTreeMap::new();
        for (skill, entry) in raw {
            let companies = match entry {
                SkillEntry::Wrapped { companies } => companies,
                SkillEntry::Bare(companies) => companies,
            };
            skills
                .entry(normalize_skill(&skill))
                .or_default()
                .extend(companies);
        }
        Ok(Self { skills })
    }

    /// Builds the catalog from the CSV file, else the JSON file, else the built-in
    /// sample. A source that is missing, unreadable or lists no skills is skipped.
    pub fn load(csv_path: &Path, json_path: &Path) -> Self {
        let catalog = read_source(csv_path, |text| {
            Self::from_csv(text.as_bytes()).map_err(|e| e.to_string())
        })
        .or_else(|| read_source(json_path, |text| Self::from_json(text).map_err(|e| e.to_string())));

        catalog.unwrap_or_else(|| {
            info!("Using built-in sample skill catalog");
            Self::sample()
        })
    }

    pub fn sample() -> Self {
        let company = |name: &str, package: &str| Company {
            name: name.to_string(),
            package: package.to_string(),
        };
        Self {
            skills: BTreeMap::from([
                ("python".to_string(), vec![company("Acme", "5 LPA")]),
                ("data science".to_string(), vec![company("DataCorp", "6 LPA")]),
                ("java".to_string(), vec![company("BigSoft", "4 LPA")]),
            ]),
        }
    }

    /// Companies for a skill, matched case-insensitively. Empty when unknown.
    pub fn companies(&self, skill: &str) -> &[Company] {
        self.skills
            .get(&normalize_skill(skill))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

fn read_source<F>(path: &Path, parse: F) -> Option<SkillCatalog>
where
    F: FnOnce(&str) -> Result<SkillCatalog, String>,
{
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            info!("No skill catalog at {} ({e})", path.display());
            return None;
        }
    };
    match parse(&text) {
        Ok(catalog) if !catalog.is_empty() => {
            info!("Loaded {} skills from {}", catalog.len(), path.display());
            Some(catalog)
        }
        Ok(_) => {
            warn!("Skill catalog {} lists no skills", path.display());
            None
        }
        Err(e) => {
            warn!("Ignoring malformed skill catalog {}: {e}", path.display());
            None
        }
    }
}

pub fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}

/// URL-safe skill slug: `/` to `-`, space to `_`, `+` to `plus`.
pub fn encode_skill(skill: &str) -> String {
    skill
        .replace('/', "-")
        .replace(' ', "_")
        .replace('+', "plus")
        .to_lowercase()
}

pub fn decode_skill(encoded: &str) -> String {
    encoded
        .replace('-', "/")
        .replace('_', " ")
        .replace("plus", "+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        for skill in ["c++", "data science", "ci/cd", "python"] {
            assert_eq!(decode_skill(&encode_skill(skill)), skill);
        }
        assert_eq!(encode_skill("C++"), "cplusplus");
        assert_eq!(encode_skill("Data Science"), "data_science");
    }

    #[test]
    fn test_both_file_shapes_and_case_folding() {
        let catalog = SkillCatalog::from_json(
            r#"{
                "Python": {"Companies": [{"name": "Acme", "package": "5 LPA"}]},
                "rust": [{"name": "Ferris Inc"}]
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.companies("PYTHON")[0].name, "Acme");
        assert_eq!(catalog.companies(" rust ")[0].package, "");
        assert!(catalog.companies("cobol").is_empty());
    }

    #[test]
    fn test_csv_rows_group_by_lowercased_skill() {
        let csv = "skill,company,package,city\n\
                   Python, Acme ,5 LPA,Pune\n\
                   python,Snake Co,7 LPA,Delhi\n\
                   ,Nobody,1 LPA,x\n\
                   Go,Gopher Ltd\n\
                   Rust,Ferris Inc,9 LPA,Kochi\n";
        let catalog = SkillCatalog::from_csv(csv.as_bytes()).unwrap();

        assert_eq!(catalog.len(), 2);
        let python = catalog.companies("python");
        assert_eq!(python.len(), 2);
        assert_eq!(python[0].name, "Acme");
        assert_eq!(python[1].package, "7 LPA");
        assert!(catalog.companies("go").is_empty());
        assert_eq!(catalog.companies("RUST")[0].name, "Ferris Inc");
    }

    #[test]
    fn test_csv_without_required_columns_is_empty() {
        let catalog = SkillCatalog::from_csv("skill,company\npython,Acme\n".as_bytes()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_load_prefers_csv_over_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv_path = dir.path().join("skills_companies_packages.csv");
        let json_path = dir.path().join("skills_jobs.json");
        std::fs::write(&csv_path, "skill,company,package\nelixir,Potion Labs,8 LPA\n").unwrap();
        std::fs::write(&json_path, r#"{"rust": [{"name": "Ferris Inc"}]}"#).unwrap();

        let catalog = SkillCatalog::load(&csv_path, &json_path);
        assert_eq!(catalog.companies("elixir")[0].name, "Potion Labs");
        assert!(catalog.companies("rust").is_empty());
    }

    #[test]
    fn test_load_falls_back_to_json_when_csv_is_missing_or_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv_path = dir.path().join("skills_companies_packages.csv");
        let json_path = dir.path().join("skills_jobs.json");
        std::fs::write(&json_path, r#"{"rust": [{"name": "Ferris Inc"}]}"#).unwrap();

        let catalog = SkillCatalog::load(&csv_path, &json_path);
        assert_eq!(catalog.companies("rust")[0].name, "Ferris Inc");

        std::fs::write(&csv_path, "name,city\nAcme,Pune\n").unwrap();
        assert_eq!(SkillCatalog::load(&csv_path, &json_path), catalog);
    }

    #[test]
    fn test_missing_files_use_sample() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog = SkillCatalog::load(&dir.path().join("absent.csv"), &dir.path().join("absent.json"));
        assert_eq!(catalog, SkillCatalog::sample());
        assert_eq!(catalog.companies("data science")[0].name, "DataCorp");
    }

    #[test]
    fn test_empty_or_malformed_files_use_sample() {
        let dir = tempfile::TempDir::new().unwrap();
        let csv_path = dir.path().join("skills_companies_packages.csv");
        let json_path = dir.path().join("skills_jobs.json");
        std::fs::write(&csv_path, "").unwrap();
        for contents in ["{}", "not json"] {
            std::fs::write(&json_path, contents).unwrap();
            assert_eq!(SkillCatalog::load(&csv_path, &json_path), SkillCatalog::sample());
        }
    }
}
