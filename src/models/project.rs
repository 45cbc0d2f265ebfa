// Project data models
use serde::{Deserialize, Serialize};

/// Engineering category that scopes a batch's extraction rules.
///
/// Serialized with the accented names the REST surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discipline {
    Civil,
    #[serde(rename = "Elétrica")]
    Eletrica,
    #[serde(rename = "Mecânica")]
    Mecanica,
}

impl Discipline {
    pub const ALL: [Discipline; 3] = [Discipline::Civil, Discipline::Eletrica, Discipline::Mecanica];

    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Civil => "Civil",
            Discipline::Eletrica => "Elétrica",
            Discipline::Mecanica => "Mecânica",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Civil" => Some(Discipline::Civil),
            "Elétrica" => Some(Discipline::Eletrica),
            "Mecânica" => Some(Discipline::Mecanica),
            _ => None,
        }
    }
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by projects and batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Idle,
    Processing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Idle => "Idle",
            ProjectStatus::Processing => "Processing",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    pub disciplines: Vec<Discipline>,
    pub last_run_at: String,
    pub status: ProjectStatus,
    pub progress: u8,
}

impl Project {
    pub fn new(name: String, code: String, client: Option<String>) -> Self {
        Self {
            id: format!("prj_{}", uuid::Uuid::new_v4()),
            name,
            code,
            client,
            disciplines: Vec::new(),
            last_run_at: chrono::Utc::now().to_rfc3339(),
            status: ProjectStatus::Idle,
            progress: 0,
        }
    }

    /// Appends the discipline if absent. Insertion order is preserved.
    pub fn add_discipline(&mut self, discipline: Discipline) {
        if !self.disciplines.contains(&discipline) {
            self.disciplines.push(discipline);
        }
    }
}

/// Creation payload for `POST /projects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

/// Total ordering applied by the project listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectSort {
    Name,
    Status,
    /// Most recent `last_run_at` first.
    #[default]
    Recent,
}

impl ProjectSort {
    /// Wire spelling of the `sort` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            ProjectSort::Name => "Nome (A–Z)",
            ProjectSort::Status => "Status",
            ProjectSort::Recent => "Recentes",
        }
    }

    /// Unrecognized values fall back to the default ordering.
    pub fn parse(s: &str) -> Self {
        match s {
            "Nome (A–Z)" => ProjectSort::Name,
            "Status" => ProjectSort::Status,
            _ => ProjectSort::Recent,
        }
    }
}

/// Parameters for the paginated project listing.
#[derive(Debug, Clone)]
pub struct ProjectQuery {
    /// Case-insensitive substring match over name, code and client.
    pub search: String,
    /// `None` means all disciplines.
    pub discipline: Option<Discipline>,
    pub sort: ProjectSort,
    /// 1-based page index.
    pub page: u32,
}

impl Default for ProjectQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            discipline: None,
            sort: ProjectSort::default(),
            page: 1,
        }
    }
}

impl ProjectQuery {
    /// Encodes the query string for `GET /projects`.
    pub fn to_query_string(&self) -> String {
        let mut params = url::form_urlencoded::Serializer::new(String::new());
        if !self.search.is_empty() {
            params.append_pair("search", &self.search);
        }
        if let Some(discipline) = self.discipline {
            params.append_pair("discipline", discipline.as_str());
        }
        params.append_pair("sort", self.sort.as_param());
        params.append_pair("page", &self.page.to_string());
        params.finish()
    }
}

/// One page of the project listing. `total` counts the whole filtered
/// set, not the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectsPage {
    pub items: Vec<Project>,
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discipline_wire_names() {
        assert_eq!(
            serde_json::to_string(&Discipline::Eletrica).unwrap(),
            "\"Elétrica\""
        );
        assert_eq!(
            serde_json::from_str::<Discipline>("\"Mecânica\"").unwrap(),
            Discipline::Mecanica
        );
        for d in Discipline::ALL {
            assert_eq!(Discipline::parse(d.as_str()), Some(d));
        }
    }

    #[test]
    fn test_new_project_defaults() {
        let project = Project::new("Pátio".to_string(), "PI-2025".to_string(), None);
        assert!(project.id.starts_with("prj_"));
        assert_eq!(project.status, ProjectStatus::Idle);
        assert_eq!(project.progress, 0);
        assert!(project.disciplines.is_empty());
    }

    #[test]
    fn test_add_discipline_is_an_ordered_set() {
        let mut project = Project::new("P".to_string(), "C".to_string(), None);
        project.add_discipline(Discipline::Eletrica);
        project.add_discipline(Discipline::Civil);
        project.add_discipline(Discipline::Eletrica);
        assert_eq!(
            project.disciplines,
            vec![Discipline::Eletrica, Discipline::Civil]
        );
    }

    #[test]
    fn test_none_client_is_omitted_from_json() {
        let project = Project::new("P".to_string(), "C".to_string(), None);
        let json = serde_json::to_value(&project).unwrap();
        assert!(json.get("client").is_none());
        assert_eq!(json["status"], "Idle");
    }

    #[test]
    fn test_query_string_round_trip() {
        let query = ProjectQuery {
            search: "pátio".to_string(),
            discipline: Some(Discipline::Eletrica),
            sort: ProjectSort::Name,
            page: 3,
        };
        let encoded = query.to_query_string();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect();
        assert!(pairs.contains(&("search".to_string(), "pátio".to_string())));
        assert!(pairs.contains(&("discipline".to_string(), "Elétrica".to_string())));
        assert!(pairs.contains(&("sort".to_string(), "Nome (A–Z)".to_string())));
        assert!(pairs.contains(&("page".to_string(), "3".to_string())));
    }

    #[test]
    fn test_sort_parse_defaults_to_recent() {
        assert_eq!(ProjectSort::parse("Nome (A–Z)"), ProjectSort::Name);
        assert_eq!(ProjectSort::parse("Status"), ProjectSort::Status);
        assert_eq!(ProjectSort::parse("anything else"), ProjectSort::Recent);
    }

    #[test]
    fn test_projects_page_uses_camel_case_page_size() {
        let page = ProjectsPage {
            items: vec![],
            page: 1,
            page_size: 12,
            total: 0,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageSize"], 12);
    }
}
