//! What happens to a submission once it's been received.
//!
//! Applications are handled in full before the applicant gets an answer:
//! validate, save, render the PDF, email it. Contact messages are answered
//! as soon as they're saved and emailed from a background task.

use serde_json::Value;
use uuid::Uuid;

use crate::document::Document;
use crate::email::application::ApplicationEmail;
use crate::email::contact::ContactEmail;
use crate::email::reference::ReferenceRequestEmail;
use crate::error::{HubError, HubResult};
use crate::models::application::Application;
use crate::models::contact::ContactMessage;
use crate::validate;
use crate::AppState;

pub async fn submit_application(state: &AppState, body: &Value) -> HubResult<Application> {
    let new_application = validate::application(body).map_err(HubError::Validation)?;
    let application = state.store.insert_application(new_application).await?;
    tracing::info!(id = %application.id, role = %application.role, "application saved");

    if let Err(error) = email_application(state, &application).await {
        tracing::error!(
            id = %application.id,
            %error,
            "application saved but never emailed, resend it from the dashboard"
        );
        return Err(error);
    }

    stamp_notified(state, &application).await
}

/// Email the application's PDF to the organization and stamp `notified_at`.
pub async fn notify_about_application(
    state: &AppState,
    application: &Application,
) -> HubResult<Application> {
    email_application(state, application).await?;

    stamp_notified(state, application).await
}

async fn email_application(state: &AppState, application: &Application) -> HubResult<()> {
    let document = Document::for_application(application);
    let email = ApplicationEmail {
        application,
        dashboard_link: state
            .mailer
            .link(&format!("/admin/applications/{}", application.id)),
        document: &document,
    };

    Ok(state.mailer.send_email(&email).await?)
}

/// The email has already gone out, so a failure here must not prompt a resend.
async fn stamp_notified(state: &AppState, application: &Application) -> HubResult<Application> {
    state
        .store
        .mark_notified(application.id)
        .await
        .map_err(|error| {
            tracing::error!(
                id = %application.id,
                %error,
                "application emailed but not marked as notified, do not resend it"
            );
            error
        })
}

/// Send the application email again, for rows that were saved but never
/// made it to the inbox.
pub async fn resend_notification(state: &AppState, id: Uuid) -> HubResult<Application> {
    let application = Application::with_id(id, state.store.as_ref()).await?;

    notify_about_application(state, &application).await
}

pub async fn submit_contact(state: &AppState, body: &Value) -> HubResult<ContactMessage> {
    let new_message = validate::contact(body).map_err(HubError::Validation)?;
    let message = state.store.insert_contact_message(new_message).await?;
    tracing::info!(id = %message.id, "contact message saved");

    let mailer = state.mailer.clone();
    let record = message.clone();
    state
        .background
        .spawn("contact notification", async move {
            let document = Document::for_contact(&record);
            mailer
                .send_email(&ContactEmail {
                    contact: &record,
                    document: &document,
                })
                .await?;
            tracing::info!(id = %record.id, "contact message emailed");

            Ok::<_, HubError>(())
        })
        .await;

    Ok(message)
}

/// Ask the applicant's referee for a reference, at most once.
pub async fn request_reference(state: &AppState, id: Uuid) -> HubResult<Application> {
    let application = Application::with_id(id, state.store.as_ref()).await?;
    if application.referee().is_none() {
        return Err(HubError::BadRequest("Referee details are missing".to_owned()));
    }

    let already_sent = || HubError::Conflict("Reference request already sent".to_owned());
    if application.reference_requested() {
        return Err(already_sent());
    }
    let claimed = state
        .store
        .claim_reference_request(id)
        .await?
        .ok_or_else(already_sent)?;
    let referee = claimed
        .referee()
        .ok_or_else(|| HubError::BadRequest("Referee details are missing".to_owned()))?;

    if let Err(error) = state
        .mailer
        .send_email(&ReferenceRequestEmail::new(&claimed, referee))
        .await
    {
        if let Err(release_error) = state.store.release_reference_request(id).await {
            tracing::error!(%id, error = %release_error, "failed to release reference request");
        }
        return Err(error.into());
    }

    tracing::info!(%id, referee = referee.email, "reference requested");
    Ok(claimed)
}
