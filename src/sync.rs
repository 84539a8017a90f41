//! Reconciliation service: closes the gap between the fixed catalogs and a
//! remote Mailjet account, one store configuration at a time.
//!
//! No retries and no rollback: remote failures propagate to the caller, and
//! items already applied in a loop stay applied.
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::catalog::{EventType, TemplateDef, CONTACT_PROPERTIES, SEGMENTS, TEMPLATES};
use crate::config::{Config, StoreSettings};
use crate::connection::Connect;
use crate::mailjet::build_template_content;
use crate::reconcile::{
    missing_properties, missing_segments, plan_webhooks, EventDesired, WebhookAction,
};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("file missing: {0}")]
    FileMissing(String),
}

/// Reconcile webhook subscriptions for one store or for all stores with a
/// distinct credential pair.
#[instrument(skip_all)]
pub async fn setup_events(
    cfg: &Config,
    connect: &mut dyn Connect,
    store_id: Option<u32>,
) -> Result<()> {
    let targets: Vec<&StoreSettings> = match store_id {
        Some(id) => cfg.store(id).into_iter().collect(),
        None => cfg.unique_event_stores(),
    };

    for store in targets {
        let api = connect.connect(cfg, store);
        let webhooks = api.get_webhooks().await?;

        let desired: Vec<EventDesired> = EventType::ALL
            .iter()
            .map(|&event| EventDesired {
                event,
                enabled: store.event_enabled(event.as_str()),
                url: cfg.callback_url(event.as_str()),
            })
            .collect();

        for action in plan_webhooks(&desired, &webhooks) {
            match action {
                WebhookAction::Create { event, url } => {
                    info!(store_id = store.store_id, event = event.as_str(), "creating webhook");
                    api.create_webhook(event, &url).await?;
                }
                WebhookAction::Update { id, event, url } => {
                    info!(store_id = store.store_id, event = event.as_str(), id, "updating webhook url");
                    api.update_webhook(id, event, &url).await?;
                }
                WebhookAction::Delete { id } => {
                    info!(store_id = store.store_id, id, "deleting disabled webhook");
                    api.delete_webhook(id).await?;
                }
            }
        }
    }
    Ok(())
}

/// Create catalog contact properties missing from the remote account.
/// Additive-only; ecommerce-enabled stores only.
#[instrument(skip_all)]
pub async fn setup_properties(
    cfg: &Config,
    connect: &mut dyn Connect,
    store_id: Option<u32>,
) -> Result<()> {
    let targets: Vec<&StoreSettings> = match store_id {
        Some(id) => cfg.store(id).into_iter().collect(),
        None => cfg.unique_ecommerce_stores(),
    };

    for store in targets {
        if !store.ecommerce_data {
            continue;
        }
        let api = connect.connect(cfg, store);
        let remote = api.get_contact_properties().await?;
        for spec in missing_properties(CONTACT_PROPERTIES, &remote) {
            info!(store_id = store.store_id, name = spec.name, "creating contact property");
            api.create_contact_property(spec).await?;
        }
    }
    Ok(())
}

/// Create catalog segments missing from the remote account, matched by
/// expression. Additive-only; ecommerce-enabled stores only.
#[instrument(skip_all)]
pub async fn setup_segments(
    cfg: &Config,
    connect: &mut dyn Connect,
    store_id: Option<u32>,
) -> Result<()> {
    let targets: Vec<&StoreSettings> = match store_id {
        Some(id) => cfg.store(id).into_iter().collect(),
        None => cfg.unique_ecommerce_stores(),
    };

    for store in targets {
        if !store.ecommerce_data {
            continue;
        }
        let api = connect.connect(cfg, store);
        let remote = api.get_segments().await?;
        for spec in missing_segments(SEGMENTS, &remote) {
            info!(store_id = store.store_id, name = spec.name, "creating segment");
            api.create_segment(spec).await?;
        }
    }
    Ok(())
}

/// Provision default templates: recreate any definition whose stored remote
/// id is absent or dangling, push content built from local assets and the
/// account's first sender, and record the new id in both scopes.
///
/// With zero senders the template is still created but no content is pushed
/// and no id is recorded, so a later run retries the full provisioning.
///
/// On error, ids already recorded in `cfg` stay recorded; callers persist the
/// config even when this returns an error.
#[instrument(skip_all)]
pub async fn setup_templates(
    cfg: &mut Config,
    connect: &mut dyn Connect,
    store_id: Option<u32>,
) -> Result<()> {
    let target_ids: Vec<u32> = match store_id {
        Some(id) => cfg.store(id).map(|s| s.store_id).into_iter().collect(),
        None => cfg
            .unique_ecommerce_stores()
            .iter()
            .map(|s| s.store_id)
            .collect(),
    };

    for sid in target_ids {
        let store = cfg
            .store(sid)
            .cloned()
            .ok_or_else(|| anyhow!("store {sid} disappeared from configuration"))?;
        let api = connect.connect(cfg, &store);

        for def in TEMPLATES {
            let existing = match store.template_id(def.key) {
                Some(id) => api.get_template(id).await?,
                None => None,
            };
            if existing.is_some() {
                continue;
            }

            let created = api.create_template(def).await?;
            let senders = api.get_senders().await?;
            let Some(sender) = senders.first() else {
                warn!(
                    store_id = sid,
                    template = def.key,
                    "account has no sender; skipping content push"
                );
                continue;
            };

            let (mjml, html) = load_assets(cfg, def).await?;
            let content = build_template_content(def, sender, mjml, html);
            api.create_template_content(created.id, &content).await?;
            cfg.set_template_id(sid, def.key, created.id);
            info!(store_id = sid, template = def.key, id = created.id, "provisioned template");
        }
    }
    Ok(())
}

/// Push local template assets for one store to the remote account, creating
/// missing templates and updating content on pre-existing ones.
///
/// Content headers come from [`build_template_content`], so a sender with an
/// empty name gets the template subject as the display name here too, not
/// only during provisioning.
#[instrument(skip_all)]
pub async fn import_templates(
    cfg: &Config,
    connect: &mut dyn Connect,
    store_id: u32,
) -> Result<()> {
    let store = cfg
        .store(store_id)
        .ok_or_else(|| anyhow!("no settings for store {store_id}"))?;
    let api = connect.connect(cfg, store);

    for def in TEMPLATES {
        let existing = match store.template_id(def.key) {
            Some(id) => api.get_template(id).await?,
            None => None,
        };
        let pre_existing = existing.is_some();
        let template = match existing {
            Some(t) => t,
            None => api.create_template(def).await?,
        };

        let senders = api.get_senders().await?;
        let Some(sender) = senders.first() else {
            warn!(
                store_id,
                template = def.key,
                "account has no sender; skipping content push"
            );
            continue;
        };

        let (mjml, html) = load_assets(cfg, def).await?;
        let content = build_template_content(def, sender, mjml, html);
        if pre_existing {
            api.update_template_content(template.id, &content).await?;
        } else {
            api.create_template_content(template.id, &content).await?;
        }
        info!(store_id, template = def.key, id = template.id, "imported template");
    }
    Ok(())
}

/// Pull remote template edits back into the local default asset files.
/// Fails when an expected local asset path does not exist.
#[instrument(skip_all)]
pub async fn export_templates(
    cfg: &Config,
    connect: &mut dyn Connect,
    store_id: u32,
) -> Result<()> {
    let store = cfg
        .store(store_id)
        .ok_or_else(|| anyhow!("no settings for store {store_id}"))?;
    let api = connect.connect(cfg, store);

    for def in TEMPLATES {
        let Some(id) = store.template_id(def.key) else {
            continue;
        };
        let Some(content) = api.get_template_content(id).await? else {
            continue;
        };

        let json_path = existing_asset_path(cfg, def.json_file)?;
        let html_path = existing_asset_path(cfg, def.html_file)?;

        let mjml = serde_json::to_string(&content.mjml_content)
            .context("serialize remote MJML content")?;
        fs::write(&json_path, mjml)
            .await
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        fs::write(&html_path, content.html_part)
            .await
            .with_context(|| format!("failed to write {}", html_path.display()))?;
        info!(store_id, template = def.key, "exported remote template to local defaults");
    }
    Ok(())
}

/// Run every reconciliation step in order (the host runs this after a
/// configuration save).
#[instrument(skip_all)]
pub async fn setup_all(
    cfg: &mut Config,
    connect: &mut dyn Connect,
    store_id: Option<u32>,
) -> Result<()> {
    setup_events(cfg, connect, store_id).await?;
    setup_properties(cfg, connect, store_id).await?;
    setup_segments(cfg, connect, store_id).await?;
    setup_templates(cfg, connect, store_id).await?;
    Ok(())
}

fn asset_path(cfg: &Config, file: &str) -> PathBuf {
    Path::new(&cfg.app.templates_dir).join(file)
}

fn existing_asset_path(cfg: &Config, file: &str) -> Result<PathBuf> {
    let path = asset_path(cfg, file);
    if !path.exists() {
        return Err(TemplateError::FileMissing(path.display().to_string()).into());
    }
    Ok(path)
}

async fn load_assets(cfg: &Config, def: &TemplateDef) -> Result<(Value, String)> {
    let json_path = asset_path(cfg, def.json_file);
    let html_path = asset_path(cfg, def.html_file);

    let raw = fs::read_to_string(&json_path)
        .await
        .with_context(|| format!("failed to read {}", json_path.display()))?;
    let mjml: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid MJML JSON in {}", json_path.display()))?;
    let html = fs::read_to_string(&html_path)
        .await
        .with_context(|| format!("failed to read {}", html_path.display()))?;
    Ok((mjml, html))
}
