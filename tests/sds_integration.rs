//! Sensitive data service integration tests
//!
//! End-to-end tests exercising index build, synonym consolidation and the
//! decision pipeline with the in-memory resolver. Covers flag overrides,
//! pass-through, evaluator dispatch, file-based loading and concurrency.

use a3s_sds::{
    CategoryEvaluator, CategoryKind, EvaluationRequest, EvaluatorRegistry, FactMap,
    InstanceStatus, MemoryNameResolver, MemoryTaxonSource, Message, MessageType, NameMatch, RankType,
    SdsConfig, SdsError, SensitiveDataService, SensitiveTaxon, SensitiveTaxonIndex,
    SensitivityCategory, SensitivityInstance, ValidationOutcome, ValidationReport,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ─── Fixtures ────────────────────────────────────────────────────

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn facts(pairs: &[(&str, &str)]) -> FactMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn citrus_canker() -> SensitiveTaxon {
    SensitiveTaxon::new("Xanthomonas axonopodis citri", RankType::Species)
        .with_family("Xanthomonadaceae")
        .with_instance(
            SensitivityInstance::new(
                SensitivityCategory::new("PBC8", CategoryKind::PlantPest),
                "PHA",
            )
            .with_zone("EMERALD", "Emerald")
            .with_dates(Some(date("2004-08-01")), Some(date("2009-01-01")))
            .with_status(InstanceStatus::Eradicated),
        )
}

fn mitchells_cockatoo() -> SensitiveTaxon {
    SensitiveTaxon::new("Lophochroa leadbeateri", RankType::Species)
        .with_common_name("Major Mitchell's Cockatoo")
        .with_instance(
            SensitivityInstance::new(
                SensitivityCategory::new("VU", CategoryKind::Conservation),
                "NSW OEH",
            )
            .with_zone("NSW", "New South Wales"),
        )
}

fn resolver() -> Arc<MemoryNameResolver> {
    Arc::new(
        MemoryNameResolver::new()
            .with_accepted("Xanthomonas citri subsp. citri", "X1", RankType::Subspecies)
            .with_synonym("Xanthomonas axonopodis citri", "XS1", "X1")
            .with_accepted("Lophochroa leadbeateri", "L1", RankType::Species)
            .with_synonym("Cacatua leadbeateri", "LS1", "L1")
            .with_accepted("Macropus rufus", "M1", RankType::Species),
    )
}

/// Eradication-window plant pest rules, simplified
struct PlantPestEvaluator {
    calls: AtomicUsize,
}

#[async_trait]
impl CategoryEvaluator for PlantPestEvaluator {
    async fn validate(
        &self,
        taxon: &SensitiveTaxon,
        facts: &FactMap,
        _samples_provided: bool,
    ) -> a3s_sds::Result<ValidationOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let event_date = facts
            .get("eventDate")
            .ok_or_else(|| SdsError::Evaluation {
                category: "plantPest".to_string(),
                reason: "eventDate required".to_string(),
            })
            .and_then(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|e| SdsError::Evaluation {
                    category: "plantPest".to_string(),
                    reason: e.to_string(),
                })
            })?;

        let applied: Vec<_> = taxon
            .instances
            .iter()
            .filter(|si| si.category.kind == CategoryKind::PlantPest)
            .cloned()
            .collect();
        let before_eradication = applied
            .iter()
            .any(|si| si.from_date.map_or(false, |from| event_date < from));

        let mut report = ValidationReport::new(
            "PBC8",
            format!("{} recorded before eradication", taxon.name),
        );
        report.add_message(Message::new(MessageType::Warning, "PBC8", "forwarded to secure view"));
        report.add_message(Message::new(MessageType::Info, "PBC8", "pest hotline"));

        Ok(ValidationOutcome::with_report(report)
            .sensitive(true)
            .loadable(before_eradication)
            .controlled_access(before_eradication)
            .with_instances(applied))
    }

    fn name(&self) -> &str {
        "plant-pest"
    }
}

struct ConservationEvaluator;

#[async_trait]
impl CategoryEvaluator for ConservationEvaluator {
    async fn validate(
        &self,
        taxon: &SensitiveTaxon,
        _facts: &FactMap,
        _samples_provided: bool,
    ) -> a3s_sds::Result<ValidationOutcome> {
        Ok(ValidationOutcome::with_report(ValidationReport::new(
            "VU",
            format!("{} location generalised", taxon.name),
        ))
        .sensitive(true)
        .loadable(true)
        .with_instances(taxon.instances.clone()))
    }

    fn name(&self) -> &str {
        "conservation"
    }
}

async fn service_with(
    entries: Vec<SensitiveTaxon>,
    flag_rules: &[&str],
) -> (SensitiveDataService, Arc<PlantPestEvaluator>) {
    let (index, _) = SensitiveTaxonIndex::build(entries, resolver()).await.unwrap();
    let plant_pest = Arc::new(PlantPestEvaluator {
        calls: AtomicUsize::new(0),
    });
    let mut registry = EvaluatorRegistry::new().with(CategoryKind::Conservation, ConservationEvaluator);
    registry.register(CategoryKind::PlantPest, plant_pest.clone());

    let config = SdsConfig::with_flag_rules(flag_rules.iter().copied())
        .with_message("pest_flag", "{0} is subject to a pest flag");
    let service = SensitiveDataService::new(config, index, registry).unwrap();
    (service, plant_pest)
}

// ─── Index ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_synonym_consolidated_under_accepted_name() {
    let (index, diagnostics) = SensitiveTaxonIndex::build(vec![citrus_canker()], resolver())
        .await
        .unwrap();

    assert_eq!(diagnostics.synthesized, 1);
    let accepted = index
        .find_by_accepted_name("Xanthomonas citri subsp. citri")
        .unwrap();
    assert_eq!(accepted.identifier.as_deref(), Some("X1"));
    assert!(!accepted.instances.is_empty());
    assert_eq!(accepted.instances, citrus_canker().instances);
}

#[tokio::test]
async fn test_identifier_lookup_returns_matching_identifier() {
    let entries = vec![citrus_canker(), mitchells_cockatoo()];
    let (index, _) = SensitiveTaxonIndex::build(entries, resolver()).await.unwrap();

    for taxon in index.iter() {
        if let Some(id) = taxon.resolved_identifier() {
            let found = index.find_by_identifier(id).unwrap();
            assert_eq!(found.identifier.as_deref(), Some(id));
        }
    }
}

#[tokio::test]
async fn test_lookup_by_synonym_name_finds_accepted() {
    let (index, _) = SensitiveTaxonIndex::build(vec![mitchells_cockatoo()], resolver())
        .await
        .unwrap();

    let found = index.find_by_name("Cacatua leadbeateri").await.unwrap();
    assert_eq!(found.name, "Lophochroa leadbeateri");
    assert!(index.find_by_name("Macropus rufus").await.is_none());
}

#[tokio::test]
async fn test_synonym_instances_reach_accepted_identifier() {
    // Accepted taxon listed under its authored name, synonym listed first
    let resolver = Arc::new(
        MemoryNameResolver::new()
            .with_accepted("Lophochroa leadbeateri", "L1", RankType::Species)
            .with_alias(
                "Lophochroa leadbeateri (Vigors, 1831)",
                NameMatch::accepted("L1", "Lophochroa leadbeateri"),
            )
            .with_synonym("Cacatua leadbeateri", "LS1", "L1"),
    );
    let cacatua = SensitiveTaxon::new("Cacatua leadbeateri", RankType::Species).with_instance(
        SensitivityInstance::new(
            SensitivityCategory::new("EN", CategoryKind::Conservation),
            "SA DEW",
        ),
    );
    let mut authored = mitchells_cockatoo();
    authored.name = "Lophochroa leadbeateri (Vigors, 1831)".to_string();

    let (index, diagnostics) =
        SensitiveTaxonIndex::build(vec![cacatua, authored, citrus_canker()], resolver)
            .await
            .unwrap();
    assert_eq!(diagnostics.error_count(), 0);

    for taxon in index.iter().filter(|t| t.is_synonym()) {
        let accepted = index
            .find_by_identifier(taxon.resolved_identifier().unwrap())
            .unwrap();
        for si in &taxon.instances {
            assert!(accepted.instances.contains(si), "{} lost from {}", si.category.value, accepted.name);
        }
    }

    let registry = EvaluatorRegistry::new().with(CategoryKind::Conservation, ConservationEvaluator);
    let service =
        SensitiveDataService::new(SdsConfig::with_flag_rules(["pest_flag"]), index, registry).unwrap();
    let outcome = service
        .evaluate(&FactMap::new(), None, Some("L1"), false)
        .await
        .unwrap();
    let categories: Vec<_> = outcome
        .instances
        .iter()
        .map(|si| si.category.value.as_str())
        .collect();
    assert_eq!(categories, vec!["VU", "EN"]);
}

#[tokio::test]
async fn test_build_from_source() {
    let source = MemoryTaxonSource::new(vec![mitchells_cockatoo(), citrus_canker()]);
    let (index, diagnostics) = SensitiveTaxonIndex::build_from_source(&source, resolver())
        .await
        .unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(diagnostics.resolved, 2);
    assert!(diagnostics.issues.is_empty());
}

// ─── Override stage ──────────────────────────────────────────────

#[tokio::test]
async fn test_flag_rule_overrides_sensitive_taxon() {
    let (service, plant_pest) = service_with(vec![citrus_canker()], &["pest_flag"]).await;

    let record = facts(&[
        ("pest_flag", "true"),
        ("scientificName", "Xanthomonas axonopodis citri"),
        ("decimalLatitude", "-23.546678"),
        ("decimalLongitude", "148.151751"),
        ("eventDate", "2004-01-29"),
    ]);
    let outcome = service
        .evaluate(&record, Some("Xanthomonas axonopodis citri"), Some("X1"), false)
        .await
        .unwrap();

    assert!(outcome.loadable);
    let report = outcome.report.as_ref().unwrap();
    assert_eq!(report.category, "pest_flag");
    assert_eq!(
        report.assertion,
        "Xanthomonas axonopodis citri is subject to a pest flag"
    );
    assert_eq!(report.messages.len(), 1);
    assert_eq!(report.messages[0].message_type, MessageType::Info);

    let result = outcome.result.as_ref().unwrap();
    assert_eq!(result["scientificName"], "Xanthomonas axonopodis citri");
    assert!(!result.contains_key("decimalLatitude"));
    assert!(!result.contains_key("eventDate"));

    assert_eq!(plant_pest.calls.load(Ordering::SeqCst), 0, "no taxon dispatch");
}

#[tokio::test]
async fn test_flag_rule_for_any_name() {
    let (service, _) = service_with(vec![], &["pest_flag"]).await;
    let outcome = service
        .evaluate(&facts(&[("pest_flag", "true")]), Some("Anything"), Some("ID"), false)
        .await
        .unwrap();
    assert!(outcome.loadable);
    assert_eq!(outcome.category(), Some("pest_flag"));
}

// ─── Pass-through ────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_index_passes_through() {
    let (service, _) = service_with(vec![], &["pest_flag"]).await;
    let outcome = service
        .evaluate(&FactMap::new(), Some("Unknown species"), None, false)
        .await
        .unwrap();
    assert!(outcome.loadable);
    assert!(!outcome.sensitive);
    assert!(outcome.report.is_none());
    assert!(outcome.result.is_none());
}

#[tokio::test]
async fn test_unlisted_taxon_passes_through() {
    let (service, plant_pest) = service_with(vec![citrus_canker()], &["pest_flag"]).await;
    let outcome = service
        .evaluate(&facts(&[("eventDate", "2004-01-29")]), Some("Macropus rufus"), None, false)
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::pass_through());
    assert_eq!(plant_pest.calls.load(Ordering::SeqCst), 0);
}

// ─── Dispatch ────────────────────────────────────────────────────

#[tokio::test]
async fn test_plant_pest_before_eradication() {
    let (service, plant_pest) = service_with(vec![citrus_canker()], &["pest_flag"]).await;
    let record = facts(&[
        ("decimalLatitude", "-23.546678"),
        ("decimalLongitude", "148.151751"),
        ("eventDate", "2004-01-29"),
    ]);

    let outcome = service
        .evaluate(&record, Some("Xanthomonas axonopodis citri"), None, false)
        .await
        .unwrap();

    assert!(outcome.valid);
    assert!(outcome.sensitive);
    assert!(outcome.loadable);
    assert!(outcome.controlled_access);
    let report = outcome.report.as_ref().unwrap();
    assert_eq!(
        report.assertion,
        "Xanthomonas citri subsp. citri recorded before eradication"
    );
    assert_eq!(report.messages_by_type(MessageType::Warning)[0].text, "forwarded to secure view");
    assert_eq!(report.messages[1].message_type, MessageType::Info);
    assert_eq!(plant_pest.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dispatch_by_identifier() {
    let (service, _) = service_with(vec![mitchells_cockatoo()], &["pest_flag"]).await;
    let outcome = service
        .evaluate(&FactMap::new(), None, Some("L1"), false)
        .await
        .unwrap();
    assert!(outcome.sensitive);
    assert_eq!(outcome.category(), Some("VU"));
    assert_eq!(outcome.instances.len(), 1);
}

#[tokio::test]
async fn test_evaluator_error_propagates() {
    let (service, _) = service_with(vec![citrus_canker()], &["pest_flag"]).await;
    let err = service
        .evaluate(&FactMap::new(), Some("Xanthomonas axonopodis citri"), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SdsError::Evaluation { .. }));
}

#[tokio::test]
async fn test_taxon_without_evaluator_is_an_error() {
    let personal = SensitiveTaxon::new("Macropus rufus", RankType::Species).with_instance(
        SensitivityInstance::new(
            SensitivityCategory::new("PRIV", CategoryKind::Personal),
            "owner",
        ),
    );
    let (service, _) = service_with(vec![personal], &["pest_flag"]).await;
    let err = service
        .evaluate(&FactMap::new(), Some("Macropus rufus"), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SdsError::NoEvaluator { .. }));
}

#[tokio::test]
async fn test_evaluate_is_idempotent() {
    let (service, _) = service_with(vec![citrus_canker(), mitchells_cockatoo()], &["pest_flag"]).await;
    let record = facts(&[("eventDate", "2004-01-29"), ("scientificName", "Cacatua leadbeateri")]);

    let first = service
        .evaluate(&record, Some("Cacatua leadbeateri"), None, true)
        .await
        .unwrap();
    let second = service
        .evaluate(&record, Some("Cacatua leadbeateri"), None, true)
        .await
        .unwrap();
    assert_eq!(first, second);
}

// ─── Service helpers ─────────────────────────────────────────────

#[tokio::test]
async fn test_find_sensitive_taxon() {
    let (service, _) = service_with(vec![mitchells_cockatoo()], &["pest_flag"]).await;

    let taxon = service
        .find_sensitive_taxon(Some("Cacatua leadbeateri"), None)
        .await
        .unwrap();
    assert_eq!(taxon.name, "Lophochroa leadbeateri");
    assert!(service.is_taxon_sensitive(None, Some("L1")).await);
    assert!(!service.is_taxon_sensitive(Some("Macropus rufus"), None).await);
}

#[tokio::test]
async fn test_evaluate_batch_keeps_order() {
    let (service, _) = service_with(vec![citrus_canker(), mitchells_cockatoo()], &["pest_flag"]).await;
    let requests = vec![
        EvaluationRequest::new(facts(&[("pest_flag", "y")])).with_name("Crex crex"),
        EvaluationRequest::new(FactMap::new()).with_name("Macropus rufus"),
        EvaluationRequest::new(FactMap::new()).with_taxon_id("L1"),
        EvaluationRequest::new(FactMap::new()).with_name("Xanthomonas axonopodis citri"),
    ];

    let results = service.evaluate_batch(&requests).await;
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().category(), Some("pest_flag"));
    assert!(results[1].as_ref().unwrap().report.is_none());
    assert_eq!(results[2].as_ref().unwrap().category(), Some("VU"));
    assert!(results[3].is_err(), "missing eventDate fails that record only");
}

#[tokio::test]
async fn test_concurrent_evaluations_share_index() {
    let (service, plant_pest) = service_with(vec![citrus_canker()], &["pest_flag"]).await;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let record = facts(&[("eventDate", "2004-01-29")]);
            service
                .evaluate(&record, Some("Xanthomonas axonopodis citri"), None, false)
                .await
                .map(|o| o.controlled_access)
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }
    assert_eq!(plant_pest.calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn test_from_config_loads_species_list() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("sensitive-species.json");
    std::fs::write(
        &list,
        serde_json::to_string(&vec![mitchells_cockatoo()]).unwrap(),
    )
    .unwrap();

    let config_path = dir.path().join("sds.toml");
    std::fs::write(
        &config_path,
        format!(
            "flag_rules = \"pest_flag\"\nspecies_list = {:?}\n",
            list.display().to_string()
        ),
    )
    .unwrap();

    let config = SdsConfig::load(&config_path).unwrap();
    let registry = EvaluatorRegistry::new().with(CategoryKind::Conservation, ConservationEvaluator);
    let (service, diagnostics) = SensitiveDataService::from_config(config, resolver(), registry)
        .await
        .unwrap();

    assert_eq!(diagnostics.resolved, 1);
    assert!(service.is_taxon_sensitive(Some("Cacatua leadbeateri"), None).await);
}

#[tokio::test]
async fn test_from_config_without_species_list() {
    let err = SensitiveDataService::from_config(
        SdsConfig::with_flag_rules(["pest_flag"]),
        resolver(),
        EvaluatorRegistry::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SdsError::Config(_)));
}

#[test]
fn test_build_outside_runtime() {
    let (index, diagnostics) = tokio_test::block_on(SensitiveTaxonIndex::build(
        vec![mitchells_cockatoo()],
        resolver(),
    ))
    .unwrap();
    assert_eq!(diagnostics.resolved, 1);
    assert!(index.find_by_exact_match("LOPHOCHROA LEADBEATERI").is_some());
}
