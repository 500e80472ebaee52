use super::*;
use crate::agent::{broadcast_frequency_for, DecisionState};
use crate::config::{AgentParams, GradualChange};
use proptest::prelude::*;
use rand::SeedableRng;

/// Agents that hold their initial opinion forever: no neighbours in range and
/// no sampling cycle ever completes.
fn frozen_config(num_agents: usize, decision: Colour, experiment_length: u64) -> SimConfig {
    SimConfig {
        num_agents,
        experiment_length,
        agent: AgentParams {
            initial_decision_state: decision,
            initial_estimate: 1.0,
            communication_range: 0.0,
            sample_interval: 1_000_000,
            ..AgentParams::default()
        },
        ..SimConfig::default()
    }
}

fn set_decision(agent: &mut Agent, decision: DecisionState, estimate: f64) {
    agent.decision = decision;
    agent.committed_estimate = estimate;
    agent.broadcast_frequency = broadcast_frequency_for(estimate);
}

fn step_until(env: &mut Environment, time: u64) {
    while env.time() < time {
        env.step().expect("step").expect("tick before experiment end");
    }
}

fn assert_agent_invariants(env: &Environment) {
    let [width, height] = env.grid().bounds();
    let colours = env.colour_distribution().colour_count();
    for agent in env.agents() {
        let [x, y] = agent.position();
        assert!((0.0..width).contains(&x) && (0.0..height).contains(&y));
        assert!(agent.decision().index() <= colours);
        if !agent.decision().is_committed() {
            assert_eq!(agent.committed_estimate(), 0.0);
            assert_eq!(agent.broadcast_frequency(), 0.0);
        }
        if !agent.is_new_recruit() {
            assert_eq!(
                agent.broadcast_frequency(),
                broadcast_frequency_for(agent.committed_estimate())
            );
        }
        assert!((0.0..=2.0).contains(&agent.broadcast_frequency()));
        assert!(agent.sample_count() <= agent.sample_cycle_length);
        assert!(agent.sample_matches() <= agent.sample_count());
    }
    assert_eq!(env.state_counts().iter().sum::<usize>(), env.agents().len());
}

#[test]
fn new_rejects_invalid_config() {
    let config = SimConfig {
        num_agents: 0,
        ..SimConfig::default()
    };
    assert!(matches!(
        Environment::new(config),
        Err(SimulationError::Config(SimConfigError::InvalidNumAgents))
    ));
}

#[test]
fn new_builds_grid_and_swarm_from_config() {
    let env = Environment::new(SimConfig::default()).expect("default config is valid");
    assert_eq!((env.grid().width(), env.grid().height()), (20, 40));
    assert_eq!(env.agents().len(), 50);
    assert_eq!(env.majority_colour(), 1);
    assert_eq!(env.state_counts(), vec![0, 0, 50]);
    assert_eq!(env.sampling_colour_counts(), vec![50, 0, 0]);
    assert!(env
        .agents()
        .iter()
        .enumerate()
        .all(|(i, a)| a.id as usize == i));
    assert_agent_invariants(&env);
}

#[test]
fn forced_consensus_converges_after_dwell() {
    let mut env = Environment::new(frozen_config(10, 1, 20_000)).unwrap();
    let outcome = env.run().expect("run");
    assert!(outcome.converged);
    assert_eq!(outcome.adaptation_time, Some(0));
    assert_eq!(outcome.final_time, 12_000);
    assert_eq!(outcome.time_history.len(), 61);
    assert_eq!(outcome.state_history[0], vec![0, 10, 0]);
    assert!(env.convergence.is_adapted());
}

#[test]
fn dip_below_threshold_resets_first_crossing() {
    let mut env = Environment::new(frozen_config(10, 1, 20_000)).unwrap();
    step_until(&mut env, 1_000);
    for agent in env.agents.iter_mut().take(4) {
        set_decision(agent, DecisionState::Uncommitted, 0.0);
    }
    let report = env.step().unwrap().unwrap();
    assert_eq!(report.time, 1_000);
    assert_eq!(report.snapshot.map(|s| s.state_counts), Some(vec![4, 6, 0]));
    assert_eq!(env.convergence.first_crossing(), None);

    for agent in env.agents.iter_mut().take(4) {
        set_decision(agent, DecisionState::Committed(1), 1.0);
    }
    let outcome = env.run().unwrap();
    assert!(outcome.converged);
    assert_eq!(outcome.adaptation_time, Some(1_200));
    assert_eq!(outcome.final_time, 13_200);
}

#[test]
fn minority_consensus_never_converges() {
    let mut env = Environment::new(frozen_config(10, 2, 2_000)).unwrap();
    let outcome = env.run().unwrap();
    assert!(!outcome.converged);
    assert_eq!(outcome.adaptation_time, None);
    assert_eq!(outcome.final_time, 1_999);
    assert_eq!(
        outcome.time_history,
        (0..10).map(|i| i * 200).collect::<Vec<u64>>()
    );
    assert!(env.is_finished());
    assert!(env.step().unwrap().is_none());
}

#[test]
fn ticks_iterate_to_experiment_length() {
    let config = SimConfig {
        tick_interval: 2,
        experiment_length: 1_000,
        ..SimConfig::default()
    };
    let mut env = Environment::new(config).unwrap();
    let reports: Vec<TickReport> = env.ticks().collect::<Result<_, _>>().unwrap();
    assert_eq!(reports.len(), 500);
    assert_eq!(reports.last().map(|r| r.time), Some(998));
    let snapshot_times: Vec<u64> = reports
        .iter()
        .filter_map(|r| r.snapshot.as_ref().map(|s| s.time))
        .collect();
    assert_eq!(snapshot_times, vec![0, 200, 400, 600, 800]);
    assert_eq!(env.ticks().count(), 0);
}

#[test]
fn broadcasts_reach_only_neighbours_and_last_sender_wins() {
    let config = SimConfig {
        num_agents: 4,
        agent: AgentParams {
            initial_decision_state: 0,
            initial_estimate: 0.0,
            initial_position: Some([5.0, 5.0]),
            communication_range: 2.0,
            ..AgentParams::default()
        },
        ..SimConfig::default()
    };
    let mut env = Environment::new(config).unwrap();
    set_decision(&mut env.agents[0], DecisionState::Committed(1), 1.0);
    set_decision(&mut env.agents[1], DecisionState::Committed(2), 1.0);
    env.agents[3].position = [15.0, 15.0];

    env.step_broadcast_phase(0);

    assert_eq!(env.agents[0].pending_message(), Some(2));
    assert_eq!(env.agents[1].pending_message(), Some(1));
    assert_eq!(env.agents[2].pending_message(), Some(2));
    assert_eq!(env.agents[3].pending_message(), None);
    assert!(env.outbox.is_empty());
}

#[test]
fn silent_swarm_sends_nothing() {
    let config = SimConfig {
        num_agents: 3,
        agent: AgentParams {
            initial_decision_state: 0,
            initial_estimate: 0.0,
            ..AgentParams::default()
        },
        ..SimConfig::default()
    };
    let mut env = Environment::new(config).unwrap();
    env.step_broadcast_phase(0);
    assert!(env.agents().iter().all(|a| a.pending_message().is_none()));
}

#[test]
fn recruitment_spreads_through_a_huddle() {
    let config = SimConfig {
        num_agents: 5,
        experiment_length: 201,
        agent: AgentParams {
            initial_decision_state: 0,
            initial_estimate: 0.0,
            initial_position: Some([10.0, 20.0]),
            speed: 1e-6,
            sample_interval: 1_000_000,
            ..AgentParams::default()
        },
        ..SimConfig::default()
    };
    let mut env = Environment::new(config).unwrap();
    set_decision(&mut env.agents[0], DecisionState::Committed(1), 0.9);
    // tick 0: agent 0 broadcasts, everyone else is uncommitted and recruits
    env.step().unwrap();
    assert_eq!(env.state_counts(), vec![0, 5, 0]);
    assert_eq!(env.transitions().recruitments, 4);
    assert!(env.agents()[1..].iter().all(|a| a.is_new_recruit()));
    assert!(env.agents()[1..]
        .iter()
        .all(|a| a.sample_colour() == Some(1) && a.committed_estimate() == 0.0));
    assert_agent_invariants(&env);
}

#[test]
fn fractional_period_broadcasts_wait_for_whole_multiples() {
    let config = SimConfig {
        num_agents: 3,
        agent: AgentParams {
            initial_decision_state: 0,
            initial_estimate: 0.0,
            initial_position: Some([10.0, 20.0]),
            ..AgentParams::default()
        },
        ..SimConfig::default()
    };
    let mut env = Environment::new(config).unwrap();
    // estimate 0.3 gives a period of 250/3 time units
    set_decision(&mut env.agents[0], DecisionState::Committed(2), 0.3);
    for now in [84, 167, 249] {
        env.step_broadcast_phase(now);
        assert!(env.agents().iter().all(|a| a.pending_message().is_none()));
    }
    env.step_broadcast_phase(250);
    assert_eq!(env.agents()[0].pending_message(), None);
    assert!(env.agents()[1..]
        .iter()
        .all(|a| a.pending_message() == Some(2)));
}

#[test]
fn corrupted_sample_counters_abort_the_run() {
    let mut env = Environment::new(frozen_config(3, 1, 1_000)).unwrap();
    let agent = &mut env.agents[2];
    agent.sample_colour = Some(1);
    agent.sample_count = agent.sample_cycle_length;
    agent.sample_matches = agent.sample_cycle_length + 1;
    let err = env.run().unwrap_err();
    assert!(matches!(
        err,
        SimulationError::InvariantViolation(SampleCounterError { agent_id: 2, .. })
    ));
    assert!(err.source().is_some());
}

#[test]
fn gradual_change_shifts_grid_towards_target() {
    let config = SimConfig {
        grid_width: 100,
        grid_height: 100,
        num_agents: 5,
        experiment_length: 1_000,
        gradual_change: Some(GradualChange {
            target_proportion: 0.2,
            duration: 900,
        }),
        ..SimConfig::default()
    };
    let mut env = Environment::new(config).unwrap();
    let initial = env.grid().colour_proportions(2);
    assert!((initial[0] - 0.8).abs() < 0.03);

    step_until(&mut env, 301);
    assert!((env.colour_distribution().probability(1) - 0.6).abs() < 1e-12);
    assert!((env.colour_distribution().probability(2) - 0.4).abs() < 1e-12);

    step_until(&mut env, 1_000);
    assert_eq!(env.colour_distribution().probability(1), 0.2);
    let proportions = env.grid().colour_proportions(2);
    assert!((proportions[0] - 0.2).abs() < 0.03, "{proportions:?}");
    assert_eq!(env.majority_colour(), 1, "majority colour is fixed at construction");

    let grid_history = env.outcome().grid_colour_history;
    assert_eq!(grid_history.len(), 5);
    assert!(grid_history[4][0] < grid_history[0][0]);
}

#[test]
fn same_seed_reproduces_run() {
    let config = SimConfig {
        experiment_length: 4_000,
        ..SimConfig::default()
    };
    let mut a = Environment::new(config.clone()).unwrap();
    let mut b = Environment::new(config).unwrap();
    assert_eq!(a.run().unwrap(), b.run().unwrap());
    for (x, y) in a.agents().iter().zip(b.agents()) {
        assert_eq!(x.position(), y.position());
        assert_eq!(x.decision(), y.decision());
    }
}

#[test]
fn different_seeds_diverge() {
    let a = Environment::new(SimConfig {
        seed: 1,
        ..SimConfig::default()
    })
    .unwrap();
    let b = Environment::new(SimConfig {
        seed: 2,
        ..SimConfig::default()
    })
    .unwrap();
    assert_ne!(a.agents()[0].position(), b.agents()[0].position());
}

#[test]
fn with_rng_accepts_injected_generator() {
    let config = SimConfig {
        experiment_length: 400,
        ..SimConfig::default()
    };
    let mut env = Environment::with_rng(config, rand::rngs::StdRng::from_seed([7; 32])).unwrap();
    let outcome = env.run().unwrap();
    assert_eq!(outcome.time_history, vec![0, 200]);
}

#[test]
fn default_scenario_runs_end_to_end() {
    let mut env = Environment::new(SimConfig::default()).unwrap();
    let outcome = env.run().unwrap();
    let mut replay = Environment::new(SimConfig::default()).unwrap();
    assert_eq!(replay.run().unwrap(), outcome);
    for (x, y) in env.agents().iter().zip(replay.agents()) {
        assert_eq!(x.position(), y.position());
        assert_eq!(x.decision(), y.decision());
        assert_eq!(x.committed_estimate(), y.committed_estimate());
    }
    assert!(outcome.final_time < 20_000);
    assert_eq!(outcome.converged, outcome.adaptation_time.is_some());
    assert_eq!(outcome.time_history.len(), outcome.state_history.len());
    assert_eq!(outcome.time_history.len(), outcome.grid_colour_history.len());
    assert!(outcome.time_history.iter().all(|t| t % 200 == 0));
    assert!(outcome
        .state_history
        .iter()
        .all(|counts| counts.len() == 3 && counts.iter().sum::<usize>() == 50));
    if let Some(adapted) = outcome.adaptation_time {
        assert_eq!(outcome.final_time, adapted + 12_000);
    } else {
        assert_eq!(outcome.final_time, 19_999);
    }
    assert!(outcome.transitions.total() > 0, "the swarm changes its mind");
    assert_eq!(outcome.state_rows().len(), outcome.time_history.len() * 3);
}

#[test]
fn environment_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Environment>();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn proptest_invariants_hold_every_tick(seed in 0u64..10_000, range in 0.0f64..6.0) {
        let config = SimConfig {
            seed,
            grid_width: 10,
            grid_height: 10,
            colour_distribution: vec![0.5, 0.3, 0.2],
            num_agents: 20,
            experiment_length: 1_500,
            agent: AgentParams {
                update_interval: 20,
                sample_interval: 10,
                sample_cycle_length: 5,
                speed: 0.05,
                communication_range: range,
                initial_decision_state: 0,
                initial_estimate: 0.0,
                ..AgentParams::default()
            },
            ..SimConfig::default()
        };
        let mut env = Environment::new(config).unwrap();
        while let Some(report) = env.step().unwrap() {
            if report.time % 50 == 0 {
                assert_agent_invariants(&env);
            }
        }
        assert_agent_invariants(&env);
        prop_assert_eq!(env.history().len(), 8);
    }
}
