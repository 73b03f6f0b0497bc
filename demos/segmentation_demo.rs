use clustervision::{
    assemble, categorical_columns, numeric_columns, preprocess, ClusterEvaluator,
    ClusteringEngine, KMeansConfig, Matrix, RawDataset, ScalingMethod, Value,
};
use ndarray::Axis;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Customer Segmentation ===\n");

    let dataset = synthetic_customers(60, 7)?;
    println!("Dataset: {} rows, {} columns", dataset.n_rows(), dataset.n_columns());
    println!("  Numeric:     {:?}", numeric_columns(&dataset));
    println!("  Categorical: {:?}\n", categorical_columns(&dataset));

    let scaling: ScalingMethod = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("standard")
        .parse()?;

    let features = preprocess(&dataset, scaling, false)?;
    println!(
        "Preprocessed with {} scaling: {} rows, {} features {:?}\n",
        scaling,
        features.n_samples(),
        features.n_features(),
        features.columns()
    );

    println!("=== Elbow & Silhouette ===");
    let config = KMeansConfig::default();
    let series = ClusterEvaluator::new(config.clone()).compute_metrics(&features, 8)?;
    for (k, metrics) in series.iter() {
        match metrics {
            Some(m) => println!(
                "  k={}: inertia {:>10.4}  silhouette {:.4}",
                k, m.inertia, m.silhouette
            ),
            None => println!("  k={}: no result", k),
        }
    }

    let k = series.best_by_silhouette().unwrap_or(3);
    println!("\n=== K-Means with k={} ===", k);
    let engine = ClusteringEngine::new(config);
    let assignment = engine.fit(&features, k)?;
    for (cluster, size) in assignment.cluster_sizes().iter().enumerate() {
        println!("  Cluster {}: {} customers", cluster, size);
    }

    let labelled = assemble(&dataset, &features, &assignment)?;
    println!("\nFirst rows with labels:");
    println!("  {}", labelled.columns().join(", "));
    for row in labelled.rows().iter().take(5) {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("  {}", cells.join(", "));
    }

    Ok(())
}

/// Three spending profiles with a few holes punched into the table.
fn synthetic_customers(n: usize, seed: u64) -> Result<RawDataset, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 4.0).map_err(|e| format!("{:?}", e))?;
    let noise = Matrix::random_using((n, 2), normal, &mut rng);
    let profiles = [(25.0, 30.0, "online"), (45.0, 80.0, "store"), (65.0, 50.0, "phone")];

    let mut rows = Vec::with_capacity(n);
    for (i, jitter) in noise.axis_iter(Axis(0)).enumerate() {
        let (age, spend, channel) = profiles[i % profiles.len()];
        let mut row = vec![
            Value::Number(age + jitter[0]),
            Value::Number(spend + jitter[1]),
            Value::from(channel),
        ];
        if rng.gen_range(0.0..1.0) < 0.05 {
            let hole = rng.gen_range(0..row.len());
            row[hole] = Value::Missing;
        }
        rows.push(row);
    }

    let columns = ["age", "annual_spend", "channel"].iter().map(|s| s.to_string()).collect();
    Ok(RawDataset::new(columns, rows)?)
}
