use criterion::{criterion_group, criterion_main, Criterion};
use grid_core::{EnergyFigures, GameConfig, ResourceUpdate};
use grid_policy::Catalog;
use grid_runtime::GameSession;
use std::time::Instant;

fn bench_full_game(c: &mut Criterion) {
    let catalog = Catalog::from_yaml_str(include_str!("../../../assets/catalog.yaml")).unwrap();
    let mut session = GameSession::new(GameConfig::default(), catalog).unwrap();
    let half = |_: &str| 0.5;
    c.bench_function("full_game", |b| {
        b.iter(|| {
            session.reset_game();
            let mut demand = 1_000u64;
            while session.turn_state().turns_remaining > 0 {
                session.apply_update(ResourceUpdate::WinterEnergy(EnergyFigures {
                    demand,
                    supply: 700,
                }));
                let _ = session.select_policy("upgrade_wind", &half);
                let _ = session.cast_vote(&half);
                let ticket = session.request_advance(Instant::now()).unwrap();
                let _ = session.presentation_finished(ticket);
                demand += 25;
            }
        })
    });
}

criterion_group!(benches, bench_full_game);
criterion_main!(benches);
