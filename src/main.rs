use std::{
    env,
    fs, io,
    sync::Arc,
    time::{Duration, Instant},
};

use log::info;
use rand::{SeedableRng, rngs::StdRng};

use concurrent_learning::{
    Discipline, Trained, Trainer, TrainerConfig,
    data::{
        self, Example, Rating, Standardizer,
        loaders::{self, CensusRecord},
        synthetic,
    },
    evaluation,
    initialization::seed_from_clock,
    models::ForestBuilder,
    specs::{DatasetSpec, ExperimentSpec, RatingsSpec, TrainerSpec},
    training::Objective,
};

const DISCIPLINES: [Discipline; 3] = [
    Discipline::Sequential,
    Discipline::DirectWrite,
    Discipline::AccumulateMerge,
];

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => {
            serde_json::from_str(&fs::read_to_string(path)?).map_err(io::Error::other)?
        }
        None => ExperimentSpec::default(),
    };

    let seed = spec.seed.unwrap_or_else(seed_from_clock);
    let mut rng = StdRng::seed_from_u64(seed);
    info!("experiment started: seed={seed} split={}", spec.split);

    let examples = load_examples(&spec.dataset, &mut rng)?;
    let (train, test) = data::split(&examples, spec.split);
    let (mut train, mut test) = (train.to_vec(), test.to_vec());

    let scaler = Standardizer::fit(&train);
    scaler.transform(&mut train);
    scaler.transform(&mut test);
    let train: Arc<[Example<bool>]> = train.into();

    let ratings = load_ratings(&spec.ratings, &mut rng)?;
    let (ratings_train, ratings_test) = data::split(&ratings, spec.split);
    let ratings_train: Arc<[Rating]> = ratings_train.into();

    println!("neural network");
    let network = spec.network.model.build()?;
    for discipline in DISCIPLINES {
        let trained =
            train_with(network.clone(), &train, spec.network.trainer, discipline, seed).await?;
        let accuracy = evaluation::accuracy(&trained, &test);
        print_run(&format!("{discipline:?}"), trained.report().elapsed(), "accuracy", accuracy);
    }

    println!("margin classifier");
    let margin = spec.margin.model.build()?;
    for discipline in DISCIPLINES {
        let trained =
            train_with(margin.clone(), &train, spec.margin.trainer, discipline, seed).await?;
        let accuracy = evaluation::accuracy(&trained, &test);
        print_run(&format!("{discipline:?}"), trained.report().elapsed(), "accuracy", accuracy);
    }

    println!("matrix factorization");
    let factorization = spec.factorization.model.build(&ratings)?;
    for discipline in DISCIPLINES {
        let trained = train_with(
            factorization.clone(),
            &ratings_train,
            spec.factorization.trainer,
            discipline,
            seed,
        )
        .await?;
        let mse = evaluation::mean_squared_error(&trained, ratings_test);
        print_run(&format!("{discipline:?}"), trained.report().elapsed(), "mse", mse);
    }

    println!("random forest");
    let builder =
        ForestBuilder::try_from(spec.forest)?.with_seed(spec.forest.seed.or(Some(seed)));

    let start = Instant::now();
    let forest = builder.grow_sequential(&train);
    let accuracy = evaluation::accuracy(&forest, &test);
    print_run("Sequential", start.elapsed(), "accuracy", accuracy);

    let start = Instant::now();
    let (forest, _) = builder.grow(&train).await;
    let accuracy = evaluation::accuracy(&forest, &test);
    print_run("FanOut", start.elapsed(), "accuracy", accuracy);

    Ok(())
}

/// Trains `objective` with the bounds of `trainer` under `discipline`.
async fn train_with<O: Objective>(
    objective: O,
    data: &Arc<[O::Item]>,
    trainer: TrainerSpec,
    discipline: Discipline,
    seed: u64,
) -> io::Result<Trained<O>> {
    let config = TrainerConfig::try_from(trainer)?
        .with_discipline(discipline)
        .with_seed(trainer.seed.or(Some(seed)));

    Ok(Trainer::new(config).train(objective, Arc::clone(data)).await?)
}

fn load_examples(spec: &DatasetSpec, rng: &mut StdRng) -> data::Result<Vec<Example<bool>>> {
    match spec {
        DatasetSpec::Synthetic {
            records,
            features,
            noise,
        } => Ok(synthetic::noisy_hyperplane(*records, *features, *noise, rng)),
        DatasetSpec::Census { path, augment_to } => {
            let mut records = loaders::load_census(path)?;
            if let Some(target) = augment_to {
                loaders::augment(&mut records, *target, rng)?;
            }

            Ok(records.iter().map(CensusRecord::to_example).collect())
        }
    }
}

fn load_ratings(spec: &RatingsSpec, rng: &mut StdRng) -> data::Result<Vec<Rating>> {
    match spec {
        RatingsSpec::Synthetic {
            users,
            items,
            ratings,
        } => Ok(synthetic::low_rank_ratings(*users, *items, *ratings, rng)),
        RatingsSpec::File { path } => loaders::load_ratings(path),
    }
}

fn print_run(name: &str, elapsed: Duration, metric: &str, value: Option<f32>) {
    match value {
        Some(value) => println!("  {name:<16} elapsed={elapsed:>10.2?} {metric}={value:.4}"),
        None => println!("  {name:<16} elapsed={elapsed:>10.2?} {metric}=n/a"),
    }
}
