//! Mock persistence & simulation service.
//!
//! Serves the whole REST surface from the local store so the dashboard
//! works offline, including a simulated processing pipeline for started
//! batches. Response shapes are identical to the real endpoints'.

pub mod sim;

use log::info;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::{
    BatchCounters, BatchFile, BatchRecord, BatchStatus, BatchUploadResponse, CreateProjectRequest,
    Discipline, DisciplineCount, FileStatus, OverviewStats, Project, ProjectQuery, ProjectSort,
    ProjectStatus, ProjectsPage, StartBatchRequest, UploadedFile,
};
use crate::storage::{Store, StoreError};

use sim::SimTimers;
pub use sim::{advance, EXTRACTION_ERROR, SIM_TICK};

/// Fixed page size of the project listing.
pub const PAGE_SIZE: usize = 12;

/// Header line of the synthesized material-list report.
pub const CSV_REPORT_HEADER: &str = "ITEM;DESCRIÇÃO;UNIDADE;QUANTIDADE;SEÇÃO";

/// Mock backend over a [`Store`]. Construct once and share; simulation
/// timer handles are owned here and aborted on drop.
pub struct MockService {
    store: Arc<Store>,
    timers: Arc<SimTimers>,
    tick: Duration,
    seed: Option<u64>,
}

impl MockService {
    pub fn new(store: Store) -> Self {
        Self::with_timing(store, SIM_TICK, None)
    }

    /// Overrides the simulation cadence and, when `seed` is set, makes
    /// every simulated run reproducible.
    pub fn with_timing(store: Store, tick: Duration, seed: Option<u64>) -> Self {
        Self {
            store: Arc::new(store),
            timers: Arc::new(SimTimers::new()),
            tick,
            seed,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// True while the simulation loop for the batch is alive.
    pub fn sim_running(&self, batch_id: &str) -> bool {
        self.timers.is_running(batch_id)
    }

    pub fn active_sim_count(&self) -> usize {
        self.timers.active_count()
    }

    /// Seeds the demo dataset unless projects already exist.
    pub fn seed_if_empty(&self) -> Result<(), ApiError> {
        if !self.store.load_projects()?.is_empty() {
            return Ok(());
        }
        info!("seeding demo projects");

        let projects = vec![
            Project {
                id: "prj_001".to_string(),
                name: "Pátio Industrial".to_string(),
                code: "PI-2025".to_string(),
                client: Some("Cliente X".to_string()),
                disciplines: vec![Discipline::Civil, Discipline::Eletrica],
                last_run_at: "2025-10-20T13:45:00Z".to_string(),
                status: ProjectStatus::Completed,
                progress: 100,
            },
            Project {
                id: "prj_002".to_string(),
                name: "Subestação Norte".to_string(),
                code: "SN-11KV".to_string(),
                client: Some("Energix".to_string()),
                disciplines: vec![Discipline::Eletrica],
                last_run_at: "2025-10-22T10:20:00Z".to_string(),
                status: ProjectStatus::Processing,
                progress: 42,
            },
            Project {
                id: "prj_003".to_string(),
                name: "Prédio Administrativo".to_string(),
                code: "PA-01".to_string(),
                client: Some("Construsul".to_string()),
                disciplines: vec![Discipline::Civil, Discipline::Mecanica],
                last_run_at: "2025-10-18T09:10:00Z".to_string(),
                status: ProjectStatus::Idle,
                progress: 0,
            },
        ];
        self.store.save_projects(&projects)?;

        let seed_batch = BatchRecord {
            batch_id: "bat_seed_001".to_string(),
            project_id: "prj_002".to_string(),
            discipline: Discipline::Eletrica,
            status: ProjectStatus::Processing,
            progress: 42.0,
            files: vec![
                BatchFile {
                    file_id: "f_001".to_string(),
                    name: "Planta_Eletrica_A1.pdf".to_string(),
                    status: FileStatus::Done,
                    duration_sec: Some(28),
                    error: None,
                },
                BatchFile {
                    file_id: "f_002".to_string(),
                    name: "Planta_Eletrica_A2.pdf".to_string(),
                    status: FileStatus::Processing,
                    duration_sec: Some(12),
                    error: None,
                },
                BatchFile {
                    file_id: "f_003".to_string(),
                    name: "Planta_Eletrica_A3.pdf".to_string(),
                    status: FileStatus::Queued,
                    duration_sec: None,
                    error: None,
                },
            ],
            counters: BatchCounters {
                ok: 1,
                failed: 0,
                total: 3,
            },
            elapsed_sec: 40,
            started_at: chrono::Utc::now().timestamp_millis() - 40_000,
        };
        let mut batches = HashMap::new();
        batches.insert(seed_batch.batch_id.clone(), seed_batch);
        self.store.save_batches(&batches)?;

        recompute_stats(&self.store)?;
        Ok(())
    }

    /// Filter, sort and paginate the project list.
    pub fn list_projects(&self, query: &ProjectQuery) -> Result<ProjectsPage, ApiError> {
        let mut projects = self.store.load_projects()?;

        if !query.search.is_empty() {
            let search = query.search.to_lowercase();
            projects.retain(|p| {
                p.name.to_lowercase().contains(&search)
                    || p.code.to_lowercase().contains(&search)
                    || p.client
                        .as_ref()
                        .map_or(false, |c| c.to_lowercase().contains(&search))
            });
        }

        if let Some(discipline) = query.discipline {
            projects.retain(|p| p.disciplines.contains(&discipline));
        }

        match query.sort {
            ProjectSort::Name => {
                projects.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            }
            ProjectSort::Status => {
                projects.sort_by(|a, b| a.status.as_str().cmp(b.status.as_str()));
            }
            ProjectSort::Recent => {
                projects.sort_by(|a, b| run_timestamp(b).cmp(&run_timestamp(a)));
            }
        }

        let total = projects.len() as u32;
        let page = query.page.max(1);
        let start = (page as usize - 1) * PAGE_SIZE;
        let items: Vec<Project> = projects.into_iter().skip(start).take(PAGE_SIZE).collect();

        Ok(ProjectsPage {
            items,
            page,
            page_size: PAGE_SIZE as u32,
            total,
        })
    }

    pub fn create_project(&self, dto: &CreateProjectRequest) -> Result<Project, ApiError> {
        let client = dto.client.clone().filter(|c| !c.is_empty());
        let project = Project::new(dto.name.clone(), dto.code.clone(), client);

        let created = project.clone();
        self.store.update_projects(move |projects| projects.push(project))?;
        recompute_stats(&self.store)?;

        info!("created project {} ({})", created.name, created.id);
        Ok(created)
    }

    /// Registers a batch with all files queued. The simulation only
    /// starts on an explicit [`MockService::start_batch`].
    pub fn upload_batch(
        &self,
        project_id: &str,
        file_names: &[String],
    ) -> Result<BatchUploadResponse, ApiError> {
        let batch_id = format!("bat_{}", uuid::Uuid::new_v4());
        let uploaded: Vec<UploadedFile> = file_names
            .iter()
            .map(|name| UploadedFile {
                name: name.clone(),
                file_id: format!("f_{}", uuid::Uuid::new_v4()),
            })
            .collect();

        let files = uploaded
            .iter()
            .map(|f| BatchFile::queued(f.file_id.clone(), f.name.clone()))
            .collect();
        let batch = BatchRecord::new(batch_id.clone(), project_id.to_string(), files);

        self.store.update_batches(|batches| {
            batches.insert(batch.batch_id.clone(), batch);
        })?;
        recompute_stats(&self.store)?;

        info!(
            "uploaded batch {} with {} files for {}",
            batch_id,
            uploaded.len(),
            project_id
        );
        Ok(BatchUploadResponse { batch_id, files: uploaded })
    }

    /// Starts processing a batch under the chosen discipline and spawns
    /// its simulation loop. Idempotent while the batch is running; a
    /// start on a completed batch restarts it.
    pub fn start_batch(
        &self,
        project_id: &str,
        batch_id: &str,
        payload: &StartBatchRequest,
    ) -> Result<(), ApiError> {
        let found = self.store.update_batches(|batches| match batches.get_mut(batch_id) {
            Some(batch) => {
                batch.discipline = payload.discipline;
                batch.started_at = chrono::Utc::now().timestamp_millis();
                batch.status = ProjectStatus::Processing;
                true
            }
            None => false,
        })?;
        if !found {
            return Err(ApiError::NotFound(format!("batch {}", batch_id)));
        }

        self.store.update_projects(|projects| {
            if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
                project.status = ProjectStatus::Processing;
                project.last_run_at = chrono::Utc::now().to_rfc3339();
                project.add_discipline(payload.discipline);
            }
        })?;
        recompute_stats(&self.store)?;

        sim::start(
            Arc::clone(&self.store),
            Arc::clone(&self.timers),
            self.tick,
            self.seed,
            project_id.to_string(),
            batch_id.to_string(),
        );
        Ok(())
    }

    pub fn get_batch_status(
        &self,
        _project_id: &str,
        batch_id: &str,
    ) -> Result<BatchStatus, ApiError> {
        let batches = self.store.load_batches()?;
        batches
            .get(batch_id)
            .map(BatchRecord::snapshot)
            .ok_or_else(|| ApiError::NotFound(format!("batch {}", batch_id)))
    }

    /// Synthesized processing log for one file.
    pub fn get_file_log(
        &self,
        _project_id: &str,
        batch_id: &str,
        file_id: &str,
    ) -> Result<String, ApiError> {
        let batches = self.store.load_batches()?;
        let file = batches
            .get(batch_id)
            .and_then(|b| b.files.iter().find(|f| f.file_id == file_id));
        let Some(file) = file else {
            return Ok("Log não encontrado".to_string());
        };

        let extracted = rand::thread_rng().gen_range(50..200);
        let mut log = format!(
            "[MOCK LOG] Arquivo: {}\nStatus: {}\nDuração: {}s\n\n",
            file.name,
            file.status,
            file.duration_sec.unwrap_or(0)
        );
        log.push_str("[INFO] Iniciando processamento com Azure Document Intelligence\n");
        log.push_str("[INFO] Upload concluído\n");
        log.push_str("[INFO] Análise de layout iniciada\n");
        match file.status {
            FileStatus::Done => log.push_str("[SUCCESS] Extração concluída com sucesso\n"),
            FileStatus::Failed => {
                if let Some(error) = &file.error {
                    log.push_str(&format!("[ERROR] {}\n", error));
                }
            }
            _ => {}
        }
        log.push_str(&format!("[INFO] Total de itens extraídos: {}", extracted));
        Ok(log)
    }

    /// Synthesized CSV material list over the batch's `Done` files.
    pub fn get_batch_report(&self, _project_id: &str, batch_id: &str) -> Result<Vec<u8>, ApiError> {
        let batches = self.store.load_batches()?;

        let mut csv = String::from(CSV_REPORT_HEADER);
        csv.push('\n');
        if let Some(batch) = batches.get(batch_id) {
            let mut rng = rand::thread_rng();
            let done_files = batch.files.iter().filter(|f| f.status == FileStatus::Done);
            for (idx, file) in done_files.enumerate() {
                let items = rng.gen_range(20..50);
                for i in 0..items {
                    csv.push_str(&format!(
                        "{}.{};Material {};UN;{};{}\n",
                        idx + 1,
                        i + 1,
                        i + 1,
                        rng.gen_range(0..100),
                        file.name
                    ));
                }
            }
        }
        Ok(csv.into_bytes())
    }

    /// Cached aggregates; computed on demand if no mutation ran yet.
    pub fn overview_stats(&self) -> Result<OverviewStats, ApiError> {
        match self.store.load_stats()? {
            Some(stats) => Ok(stats),
            None => Ok(recompute_stats(&self.store)?),
        }
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.timers.abort_all();
    }
}

fn run_timestamp(project: &Project) -> i64 {
    chrono::DateTime::parse_from_rfc3339(&project.last_run_at)
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

/// Recomputes the cached overview stats from the whole store.
pub(crate) fn recompute_stats(store: &Store) -> Result<OverviewStats, StoreError> {
    let projects = store.load_projects()?;
    let batches = store.load_batches()?;

    let total_processed: u32 = batches.values().map(|b| b.counters.total).sum();
    let total_ok: u32 = batches.values().map(|b| b.counters.ok).sum();
    let success_rate = if total_processed > 0 {
        total_ok as f64 / total_processed as f64
    } else {
        0.0
    };

    let durations: Vec<u32> = batches
        .values()
        .flat_map(|b| b.files.iter().filter_map(|f| f.duration_sec))
        .collect();
    let avg_duration_sec = if durations.is_empty() {
        0
    } else {
        (durations.iter().map(|d| f64::from(*d)).sum::<f64>() / durations.len() as f64).round()
            as u32
    };

    let by_discipline = Discipline::ALL
        .iter()
        .map(|d| DisciplineCount {
            name: *d,
            count: projects.iter().filter(|p| p.disciplines.contains(d)).count() as u32,
        })
        .collect();

    let stats = OverviewStats {
        total_processed,
        success_rate,
        avg_duration_sec,
        by_discipline,
    };
    store.save_stats(&stats)?;
    Ok(stats)
}
