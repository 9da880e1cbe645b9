use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::CrawlConfig;
use crate::error::{CrawlError, Phase, Result};
use crate::fetch::PageFetcher;
use crate::model::{Entity, IndexListing, Member, Signature};
use crate::parser::{entity as entity_page, index as index_page, signature as signature_page};
use crate::pool::fan_out;
use crate::sink::{Sink, OBJECTS, PROPERTIES, REQUIRES, SIGNATURES};

/// Entities with their details filled in, plus every member row found.
#[derive(Debug, Default)]
pub struct Enriched {
    pub entities: Vec<Entity>,
    pub properties: Vec<Member>,
    pub methods: Vec<Member>,
}

/// Record counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requires: usize,
    pub entities: usize,
    pub properties: usize,
    pub methods: usize,
    pub signatures: usize,
}

impl RunSummary {
    pub fn print(&self) {
        println!(
            "Saved {} requires, {} objects, {} properties, {} signatures ({} methods).",
            self.requires, self.entities, self.properties, self.signatures, self.methods,
        );
    }
}

/// Fetch the index page and list require tokens and entity stubs.
pub async fn index_phase<F: PageFetcher>(
    fetcher: &F,
    index_url: &str,
    base_url: &str,
) -> Result<IndexListing> {
    info!("Fetching index page: {}", index_url);
    let html = fetcher.fetch(index_url).await?;
    let listing = index_page::extract(&html, base_url);
    info!(
        requires = listing.requires.len(),
        entities = listing.entities.len(),
        "Index parsed"
    );
    Ok(listing)
}

/// Visit every entity page, filling description and classifier and collecting
/// static properties and methods in entity order.
pub async fn enrich_phase<F: PageFetcher>(
    fetcher: Arc<F>,
    entities: Vec<Entity>,
    base_url: &str,
    concurrency: usize,
) -> Result<Enriched> {
    let base = base_url.to_string();
    let pages = fan_out(
        "objects",
        entities,
        concurrency,
        |e: &Entity| e.text.clone(),
        move |mut entity: Entity| {
            let fetcher = Arc::clone(&fetcher);
            let base = base.clone();
            async move {
                let html = fetcher.fetch(&entity.detail_url).await?;
                let details = entity_page::extract(&html, &entity.text, &base);
                let (properties, methods) = entity_page::apply(&mut entity, details);
                Ok::<_, CrawlError>((entity, properties, methods))
            }
        },
    )
    .await?;

    let mut enriched = Enriched::default();
    for (entity, properties, methods) in pages {
        enriched.entities.push(entity);
        enriched.properties.extend(properties);
        enriched.methods.extend(methods);
    }
    Ok(enriched)
}

/// Visit every method page and turn each C# signature block into a snippet.
/// Consumes the method list.
pub async fn signature_phase<F: PageFetcher>(
    fetcher: Arc<F>,
    methods: Vec<Member>,
    concurrency: usize,
) -> Result<Vec<Signature>> {
    let per_method = fan_out(
        "signatures",
        methods,
        concurrency,
        |m: &Member| m.text.clone(),
        move |method: Member| {
            let fetcher = Arc::clone(&fetcher);
            async move {
                let html = fetcher.fetch(&method.detail_url).await?;
                Ok::<_, CrawlError>(signature_page::extract(&html, &method))
            }
        },
    )
    .await?;

    Ok(per_method.into_iter().flatten().collect())
}

/// Full crawl. Each phase's list is persisted before the next phase starts,
/// so a later failure leaves earlier artifacts complete.
pub async fn run<F: PageFetcher, S: Sink>(
    fetcher: Arc<F>,
    sink: &S,
    cfg: &CrawlConfig,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    // Index
    let t = Instant::now();
    let IndexListing { requires, mut entities } =
        index_phase(fetcher.as_ref(), &cfg.index_url(), &cfg.base_url)
            .await
            .map_err(|e| e.in_phase(Phase::Index))?;
    summary.requires = requires.len();
    sink.write(REQUIRES, &requires).map_err(|e| e.in_phase(Phase::Persist))?;
    drop(requires);
    info!("Index phase done in {:.1}s", t.elapsed().as_secs_f64());

    if let Some(limit) = cfg.limit {
        entities.truncate(limit);
    }

    // Entities + members
    let t = Instant::now();
    let Enriched {
        entities,
        properties,
        methods,
    } = enrich_phase(Arc::clone(&fetcher), entities, &cfg.base_url, cfg.concurrency)
        .await
        .map_err(|e| e.in_phase(Phase::Enrich))?;
    summary.entities = entities.len();
    summary.properties = properties.len();
    summary.methods = methods.len();

    sink.write(PROPERTIES, &properties).map_err(|e| e.in_phase(Phase::Persist))?;
    sink.write(OBJECTS, &entities).map_err(|e| e.in_phase(Phase::Persist))?;
    drop(properties);
    drop(entities);
    info!("Enrich phase done in {:.1}s", t.elapsed().as_secs_f64());

    // Signatures
    let t = Instant::now();
    let signatures = signature_phase(Arc::clone(&fetcher), methods, cfg.concurrency)
        .await
        .map_err(|e| e.in_phase(Phase::Signatures))?;
    summary.signatures = signatures.len();
    sink.write(SIGNATURES, &signatures).map_err(|e| e.in_phase(Phase::Persist))?;
    info!("Signature phase done in {:.1}s", t.elapsed().as_secs_f64());

    Ok(summary)
}

// ── Tests ──
