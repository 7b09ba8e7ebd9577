//! Axum route handlers for skill search and company applications.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::session::{CurrentSession, UserDetails};
use crate::errors::AppError;
use crate::jobs::skills::{decode_skill, encode_skill, normalize_skill, Company, SkillCatalog};
use crate::models::application::ApplicationRecord;
use crate::state::AppState;
use crate::store::StoreError;
use crate::uploads::{save_upload, MultipartForm, RESUME_DIR};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SkillSearchRequest {
    #[serde(default)]
    pub skill: String,
}

#[derive(Debug, Serialize)]
pub struct SkillSearchResponse {
    pub skill: String,
    pub encoded_skill: String,
    pub companies: Vec<Company>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectApplyQuery {
    pub all: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SelectApplyResponse {
    pub skill: String,
    pub encoded_skill: String,
    pub companies: Vec<Company>,
    pub preselect_all: bool,
    pub user_details: UserDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyAllRequest {
    pub skill: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub name: String,
    pub company: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeCheckResponse {
    pub message: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Json<SkillCatalog> {
    Json(state.skills.as_ref().clone())
}

/// POST /api/v1/skills
///
/// Looks up companies for a skill and remembers the skill for "apply all".
/// An unknown skill is not an error: the list is empty and a message explains why.
pub async fn handle_search_skill(
    State(state): State<AppState>,
    session: CurrentSession,
    Json(request): Json<SkillSearchRequest>,
) -> Result<Json<SkillSearchResponse>, AppError> {
    let skill = normalize_skill(&request.skill);
    if skill.is_empty() {
        return Err(AppError::Validation("Please enter a valid skill.".to_string()));
    }

    let remembered = skill.clone();
    state
        .sessions
        .update(session.token, move |s| s.skill = Some(remembered))
        .await;

    let companies = state.skills.companies(&skill).to_vec();
    let message = companies
        .is_empty()
        .then(|| format!("No jobs available for '{skill}'"));
    Ok(Json(SkillSearchResponse {
        encoded_skill: encode_skill(&skill),
        skill,
        companies,
        message,
    }))
}

/// GET /api/v1/select_apply/:encoded_skill
pub async fn handle_select_apply(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(encoded_skill): Path<String>,
    Query(query): Query<SelectApplyQuery>,
) -> Result<Json<SelectApplyResponse>, AppError> {
    let skill = decode_skill(&encoded_skill);
    let companies = state.skills.companies(&skill).to_vec();
    if companies.is_empty() {
        return Err(AppError::NotFound(format!("No companies found for '{skill}'")));
    }

    Ok(Json(SelectApplyResponse {
        skill,
        encoded_skill,
        companies,
        preselect_all: query.all.as_deref() == Some("1"),
        user_details: session.data.user_details.unwrap_or_default(),
    }))
}

/// POST /api/v1/apply_all
///
/// Redirects to the multi-select page with every company preselected.
pub async fn handle_apply_all(
    session: CurrentSession,
    request: Option<Json<ApplyAllRequest>>,
) -> Result<Redirect, AppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let skill = request
        .skill
        .filter(|s| !s.trim().is_empty())
        .or(session.data.skill)
        .ok_or_else(|| AppError::Validation("Please choose a skill first.".to_string()))?;

    Ok(Redirect::to(&format!(
        "/api/v1/select_apply/{}?all=1",
        encode_skill(&skill)
    )))
}

/// POST /api/v1/apply
///
/// Single application with optional resume. The applicant's contact details are
/// remembered in the session for later multi-company applications.
pub async fn handle_apply(
    State(state): State<AppState>,
    session: CurrentSession,
    multipart: Multipart,
) -> Result<Json<ApplicationResponse>, AppError> {
    let form = MultipartForm::read(multipart).await?;

    let name = format!("{} {}", form.text("first_name"), form.text("last_name"))
        .trim()
        .to_string();
    let phone = format!("{}{}", form.text("country_code"), form.text("phone"));
    let resume = match form.file("resume") {
        Some(file) => save_upload(&state.config.upload_dir.join(RESUME_DIR), file).await?,
        None => String::new(),
    };

    let application = ApplicationRecord {
        name: name.clone(),
        email: form.text("email"),
        phone: phone.clone(),
        address: form.text("address"),
        experience: form.text("experience"),
        company: form.text("company"),
        resume,
    };
    let details = UserDetails {
        name: name.clone(),
        email: application.email.clone(),
        phone,
    };
    let company = application.company.clone();

    state
        .stores
        .applications
        .update(move |apps| {
            apps.push(application);
            Ok::<_, StoreError>(())
        })
        .await?;
    state
        .sessions
        .update(session.token, move |s| s.user_details = Some(details))
        .await;

    info!("{} applied to {company}", session.username());
    Ok(Json(ApplicationResponse {
        message: format!("Thank you {name}, your application to {company} was received."),
        name,
        company,
    }))
}

/// POST /api/v1/apply_selected
///
/// One application per selected company, sharing one resume and the contact
/// details remembered from the last single application.
pub async fn handle_apply_selected(
    State(state): State<AppState>,
    session: CurrentSession,
    multipart: Multipart,
) -> Result<Json<ApplicationResponse>, AppError> {
    let form = MultipartForm::read(multipart).await?;

    let selected: Vec<String> = form
        .texts("selected_companies")
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if selected.is_empty() {
        return Err(AppError::Validation("Select at least one company.".to_string()));
    }
    let resume_file = form
        .file("resume")
        .ok_or_else(|| AppError::Validation("Please upload resume.".to_string()))?;
    let resume = save_upload(&state.config.upload_dir.join(RESUME_DIR), resume_file).await?;

    let details = session.data.user_details.clone().unwrap_or_default();
    let applications: Vec<ApplicationRecord> = selected
        .iter()
        .map(|company| ApplicationRecord {
            name: details.name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            company: company.clone(),
            resume: resume.clone(),
            ..Default::default()
        })
        .collect();

    state
        .stores
        .applications
        .update(move |apps| {
            apps.extend(applications);
            Ok::<_, StoreError>(())
        })
        .await?;

    let company = selected.join(", ");
    let name = if details.name.is_empty() {
        "User".to_string()
    } else {
        details.name
    };
    info!("{} applied to {} companies", session.username(), selected.len());
    Ok(Json(ApplicationResponse {
        message: format!("Thank you {name}, your applications to {company} were received."),
        name,
        company,
    }))
}

/// POST /api/v1/check_resume
///
/// Stores a resume and, for PDFs, reports how many words could be extracted.
pub async fn handle_check_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResumeCheckResponse>, AppError> {
    let form = MultipartForm::read(multipart).await?;
    let file = form
        .file("resume")
        .ok_or_else(|| AppError::Validation("No resume uploaded".to_string()))?;

    let filename = save_upload(&state.config.upload_dir.join(RESUME_DIR), file).await?;
    let word_count = if filename.to_ascii_lowercase().ends_with(".pdf") {
        pdf_word_count(file.data.clone()).await
    } else {
        None
    };

    Ok(Json(ResumeCheckResponse {
        message: "Resume uploaded successfully!".to_string(),
        filename,
        word_count,
    }))
}

async fn pdf_word_count(data: bytes::Bytes) -> Option<usize> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data)).await;
    match extracted {
        Ok(Ok(text)) => Some(text.split_whitespace().count()),
        Ok(Err(e)) => {
            warn!("Could not extract resume text: {e}");
            None
        }
        Err(e) => {
            warn!("Resume text extraction task failed: {e}");
            None
        }
    }
}
