use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::str::FromStr;

use substance_flow_engine::{Engine, EngineNumber, StreamName, UnitLabel, YearMatcher};

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn substance(year: i32, application: &str, substance: &str) -> Engine {
    let mut engine = Engine::new(year);
    engine.set_stanza("default").unwrap();
    engine.set_application(application).unwrap();
    engine.set_substance(substance).unwrap();
    engine
}

/// Scenario 1: basic manufacture. Manufacture is written in mass (mt), so it
/// carries no head-count of its own and population is left exactly as set.
#[test]
fn basic_manufacture() {
    let mut engine = substance(1, "refrigeration", "HFC-134a");
    engine
        .set_initial_charge(StreamName::manufacture, EngineNumber::new(d("5"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::priorEquipment, EngineNumber::new(d("20000"), "units"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::equipment, EngineNumber::new(d("20000"), "units"), YearMatcher::unbounded())
        .unwrap();
    // 5 tCO2e/mt == 0.005 tCO2e/kg; the engine's consumption arithmetic
    // operates on mass already resolved to kg.
    engine
        .apply_equals(EngineNumber::new(d("0.005"), "tCO2e/kg"))
        .unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("100"), "mt"), YearMatcher::unbounded())
        .unwrap();

    let results = engine.get_results().unwrap();
    let row = results.find("refrigeration", "HFC-134a").unwrap();
    assert_eq!(row.manufacture.value, d("100000"));
    assert_eq!(row.manufacture.units.as_str(), "kg");
    assert_eq!(row.domestic_consumption.value, d("500"));
    assert_eq!(row.population.value, d("20000"));
}

/// Scenario 2: cap with a count-based limit and recharge-on-top.
#[test]
fn cap_with_recharge_on_top() {
    let mut engine = substance(1, "refrigeration", "HFC-134a");
    engine
        .set_initial_charge(StreamName::manufacture, EngineNumber::new(d("2"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::priorEquipment, EngineNumber::new(d("20"), "units"), YearMatcher::unbounded())
        .unwrap();
    engine
        .recharge(EngineNumber::new(d("10"), "%"), EngineNumber::new(d("1"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("100"), "kg"), YearMatcher::unbounded())
        .unwrap();

    let capped = engine
        .cap_stream(StreamName::manufacture, EngineNumber::new(d("5"), "units"), None, YearMatcher::unbounded())
        .unwrap();
    assert_eq!(capped.value, d("12"));
    assert_eq!(engine.get_stream(StreamName::manufacture).unwrap().value, d("12"));
}

/// Scenario 3: declaring a recovery with 0% recovery rate must not change
/// equipment evolution relative to a BAU run that never calls `recover`.
#[test]
fn zero_recovery_rate_matches_bau() {
    let mut bau = substance(1, "refrigeration", "HFC-134a");
    bau.set_stream(StreamName::priorEquipment, EngineNumber::new(d("1000"), "units"), YearMatcher::unbounded())
        .unwrap();
    bau.set_stream(StreamName::import, EngineNumber::new(d("200"), "units"), YearMatcher::unbounded())
        .unwrap();

    let mut with_recovery = substance(1, "refrigeration", "HFC-134a");
    with_recovery
        .set_stream(StreamName::priorEquipment, EngineNumber::new(d("1000"), "units"), YearMatcher::unbounded())
        .unwrap();
    with_recovery
        .set_stream(StreamName::import, EngineNumber::new(d("200"), "units"), YearMatcher::unbounded())
        .unwrap();
    with_recovery
        .recover(EngineNumber::new(d("50"), "kg"), EngineNumber::new(d("0"), "%"), None, YearMatcher::unbounded())
        .unwrap();

    let bau_results = bau.get_results().unwrap();
    let recovery_results = with_recovery.get_results().unwrap();
    let bau_row = bau_results.find("refrigeration", "HFC-134a").unwrap();
    let recovery_row = recovery_results.find("refrigeration", "HFC-134a").unwrap();
    assert_eq!(bau_row.population.value, recovery_row.population.value);
    assert_eq!(recovery_row.recycle.value, Decimal::ZERO);
}

/// Scenario 4: displacement with unit conversion across two substances.
#[test]
fn displacement_across_substances() {
    let mut engine = Engine::new(1);
    engine.set_stanza("default").unwrap();
    engine.set_application("refrigeration").unwrap();

    engine.set_substance("sub_a").unwrap();
    engine
        .set_initial_charge(StreamName::manufacture, EngineNumber::new(d("10"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::priorEquipment, EngineNumber::new(d("20"), "units"), YearMatcher::unbounded())
        .unwrap();
    engine
        .recharge(EngineNumber::new(d("10"), "%"), EngineNumber::new(d("10"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("300"), "kg"), YearMatcher::unbounded())
        .unwrap();

    engine.set_substance("sub_b").unwrap();
    engine
        .set_initial_charge(StreamName::manufacture, EngineNumber::new(d("20"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("200"), "kg"), YearMatcher::unbounded())
        .unwrap();

    engine.set_substance("sub_a").unwrap();
    let capped = engine
        .cap_stream(StreamName::manufacture, EngineNumber::new(d("5"), "units"), Some("sub_b"), YearMatcher::unbounded())
        .unwrap();
    assert_eq!(capped.value, d("70"));

    engine.set_substance("sub_b").unwrap();
    assert_eq!(engine.get_stream(StreamName::manufacture).unwrap().value, d("660"));
}

/// Scenario 5: replace moves mass between substances and consumption tracks
/// each substance's own intensity on the post-replace balance.
#[test]
fn replace_moves_consumption_between_substances() {
    let mut engine = Engine::new(1);
    engine.set_stanza("default").unwrap();
    engine.set_application("refrigeration").unwrap();

    engine.set_substance("sub_A").unwrap();
    // 10 tCO2e/mt == 0.01 tCO2e/kg.
    engine.apply_equals(EngineNumber::new(d("0.01"), "tCO2e/kg")).unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("50"), "mt"), YearMatcher::unbounded())
        .unwrap();

    engine.set_substance("sub_B").unwrap();
    // 5 tCO2e/mt == 0.005 tCO2e/kg.
    engine.apply_equals(EngineNumber::new(d("0.005"), "tCO2e/kg")).unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("50"), "mt"), YearMatcher::unbounded())
        .unwrap();

    engine.set_substance("sub_A").unwrap();
    engine
        .replace(EngineNumber::new(d("25"), "mt"), StreamName::manufacture, "sub_B", YearMatcher::unbounded())
        .unwrap();

    let results = engine.get_results().unwrap();
    let a = results.find("refrigeration", "sub_A").unwrap();
    let b = results.find("refrigeration", "sub_B").unwrap();
    assert_eq!(a.manufacture.value, d("25000"));
    assert_eq!(a.domestic_consumption.value, d("250"));
    assert_eq!(b.manufacture.value, d("75000"));
    assert_eq!(b.domestic_consumption.value, d("375"));
}

/// Scenario 6: carried equipment growth only counts within-year count-unit
/// writes, not the persisted stream value itself.
#[test]
fn carry_over_across_years() {
    let mut engine = substance(2025, "refrigeration", "HFC-134a");
    engine
        .set_stream(StreamName::priorEquipment, EngineNumber::new(d("20000"), "units"), YearMatcher::unbounded())
        .unwrap();
    let during = YearMatcher::new(Some(2025), Some(2026));

    engine.set_stream(StreamName::import, EngineNumber::new(d("800"), "units"), during).unwrap();
    let y2025 = engine.get_results().unwrap();
    assert_eq!(y2025.find("refrigeration", "HFC-134a").unwrap().population.value, d("20800"));

    engine.increment_year();
    engine.set_stream(StreamName::import, EngineNumber::new(d("800"), "units"), during).unwrap();
    let y2026 = engine.get_results().unwrap();
    assert_eq!(y2026.find("refrigeration", "HFC-134a").unwrap().population.value, d("21600"));

    engine.increment_year();
    engine.set_stream(StreamName::import, EngineNumber::new(d("800"), "units"), during).unwrap();
    let y2027 = engine.get_results().unwrap();
    assert_eq!(y2027.find("refrigeration", "HFC-134a").unwrap().population.value, d("21600"));

    engine.increment_year();
    engine.set_stream(StreamName::import, EngineNumber::new(d("800"), "units"), during).unwrap();
    let y2028 = engine.get_results().unwrap();
    assert_eq!(y2028.find("refrigeration", "HFC-134a").unwrap().population.value, d("21600"));
}

/// A second `set` of the same count-unit stream within a year replaces the
/// first's contribution to equipment growth rather than summing with it,
/// since `Set` itself has replace (not accumulate) semantics.
#[test]
fn repeated_set_of_same_stream_does_not_double_count_growth() {
    let mut engine = substance(2025, "refrigeration", "HFC-134a");
    engine
        .set_stream(StreamName::priorEquipment, EngineNumber::new(d("20000"), "units"), YearMatcher::unbounded())
        .unwrap();

    engine.set_stream(StreamName::import, EngineNumber::new(d("800"), "units"), YearMatcher::unbounded()).unwrap();
    engine.set_stream(StreamName::import, EngineNumber::new(d("500"), "units"), YearMatcher::unbounded()).unwrap();

    let results = engine.get_results().unwrap();
    let row = results.find("refrigeration", "HFC-134a").unwrap();
    assert_eq!(row.population.value, d("20500"));
    assert_eq!(row.import.value, d("500"));
}

/// Round-trip identities asserted in spec section 8's quantified invariants.
#[test]
fn kg_mt_and_mass_count_round_trips_are_identities() {
    let mut engine = substance(1, "refrigeration", "HFC-134a");
    engine
        .set_initial_charge(StreamName::manufacture, EngineNumber::new(d("4"), "kg/unit"), YearMatcher::unbounded())
        .unwrap();
    engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("2000"), "kg"), YearMatcher::unbounded())
        .unwrap();

    let current = engine.get_stream(StreamName::manufacture).unwrap();
    let as_mt = engine.convert(&UnitLabel::new("mt"), &current).unwrap();
    assert_eq!(as_mt.value, d("2"));
    let back_to_kg = engine.convert(&UnitLabel::new("kg"), &as_mt).unwrap();
    assert_eq!(back_to_kg.value, d("2000"));

    let as_units = engine.convert(&UnitLabel::new("units"), &current).unwrap();
    assert_eq!(as_units.value, d("500"));
    let back_to_kg_from_units = engine.convert(&UnitLabel::new("kg"), &as_units).unwrap();
    assert_eq!(back_to_kg_from_units.value, d("2000"));
}

/// Year matcher semantics asserted directly against the quantified invariant.
#[test]
fn year_matcher_matches_regardless_of_endpoint_order() {
    let ordered = YearMatcher::new(Some(2020), Some(2030));
    let reversed = YearMatcher::new(Some(2030), Some(2020));
    for year in [2019, 2020, 2025, 2030, 2031] {
        assert_eq!(ordered.get_in_range(year), reversed.get_in_range(year));
    }
}

/// Setting a stream to a value in its canonical unit and reading it back
/// yields the same value exactly.
#[test]
fn canonical_unit_round_trip_is_exact() {
    let mut engine = substance(1, "refrigeration", "HFC-134a");
    let written = engine
        .set_stream(StreamName::manufacture, EngineNumber::new(d("12345.6789"), "kg"), YearMatcher::unbounded())
        .unwrap();
    assert_eq!(written.value, d("12345.6789"));
    assert_eq!(engine.get_stream(StreamName::manufacture).unwrap().value, d("12345.6789"));
}
