use clap::Args;
use geoalarm_core::{compute_distance, evaluate_proximity, Config, GeoPoint, ThresholdKm};
use serde::Serialize;

#[derive(Args)]
pub struct DistanceArgs {
    /// Start point as "lat,lon"
    #[arg(allow_hyphen_values = true)]
    from: GeoPoint,
    /// End point as "lat,lon"
    #[arg(allow_hyphen_values = true)]
    to: GeoPoint,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Current position as "lat,lon"
    #[arg(long, allow_hyphen_values = true)]
    position: Option<GeoPoint>,
    /// Destination as "lat,lon"
    #[arg(long, allow_hyphen_values = true)]
    destination: Option<GeoPoint>,
    /// Threshold in km (2, 3, 4, 5, 10 or 20); defaults to the configured one
    #[arg(long)]
    threshold: Option<ThresholdKm>,
}

#[derive(Serialize)]
struct DistanceOutput {
    from: GeoPoint,
    to: GeoPoint,
    distance_meters: f64,
}

#[derive(Serialize)]
struct CheckOutput {
    threshold_km: ThresholdKm,
    distance_meters: Option<f64>,
    is_near: bool,
}

pub fn distance(args: DistanceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let out = DistanceOutput {
        from: args.from,
        to: args.to,
        distance_meters: compute_distance(&args.from, &args.to),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub fn check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let threshold = match args.threshold {
        Some(t) => t,
        None => Config::load_or_default().proximity.threshold_km,
    };
    let reading = evaluate_proximity(args.position.as_ref(), args.destination.as_ref(), threshold);
    let out = CheckOutput {
        threshold_km: threshold,
        distance_meters: reading.distance_meters,
        is_near: reading.is_near,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub fn thresholds() -> Result<(), Box<dyn std::error::Error>> {
    let default = ThresholdKm::default();
    for t in ThresholdKm::ALL {
        let marker = if t == default { " (default)" } else { "" };
        println!("{}{marker}", t.km());
    }
    Ok(())
}
