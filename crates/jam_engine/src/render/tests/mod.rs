//! Scenario tests running whole frames on the headless device

mod frame_scenarios;
