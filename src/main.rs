// main.rs
// Description: Binary entry point with menu loop. Trains an MLP on sums of integers and a
//              small GPT on a salutation corpus; loads model layouts from JSON.
// History:
// - 2026-10-16: Replace checkpoint commands with config load and save.
// Author: handgrad contributors

use std::io::Write;

use rand::Rng;

use handgrad::{
    train_gpt, FeedForwardNetwork, Gpt, GptConfig, NetError, PlateauPolicy, TrainingMethod,
    TrainingSession,
};

const SUM_INPUTS: usize = 5;
const SUM_STEPS: usize = 100_000;
const SUM_LEARNING_RATE: f64 = 0.001;
const GENERATE_STEPS: usize = 20;

const SALUTATIONS: [&str; 12] = [
    "Hello, how are you?",
    "Hi there, nice to meet you.",
    "Good morning, how did you sleep?",
    "Good evening, how was your day?",
    "Hello friend, long time no see.",
    "Hi, how is it going?",
    "Good afternoon, are you busy?",
    "Hey, what are you doing today?",
    "Hello there, welcome back.",
    "Good morning friend, ready to go?",
    "Hi friend, how was your morning?",
    "Hey there, how are you doing?",
];

fn read_line_trimmed() -> Result<String, String> {
    let mut s_input = String::new();
    std::io::stdin()
        .read_line(&mut s_input)
        .map_err(|e| format!("input_read_error: {e}"))?;
    Ok(s_input.trim().to_string())
}

fn prompt(s_label: &str) -> Result<String, String> {
    print!("{s_label}");
    let _ = std::io::stdout().flush();
    read_line_trimmed()
}

fn run_sum_demo() -> Result<(), NetError> {
    let mut network = FeedForwardNetwork::builder()
        .set_input(SUM_INPUTS)
        .set_output(1, None)
        .build()?;
    let mut rng = rand::rng();

    println!(
        "Training {}->1 network on {} random sums, learning rate {}",
        SUM_INPUTS, SUM_STEPS, SUM_LEARNING_RATE
    );
    let mut session = TrainingSession::new(&mut network)
        .set_method(TrainingMethod::Stochastic)
        .set_learning_rate(SUM_LEARNING_RATE);
    for _ in 0..SUM_STEPS {
        let v_input: Vec<f64> = (0..SUM_INPUTS)
            .map(|_| rng.random_range(-20..=20) as f64)
            .collect();
        let d_sum: f64 = v_input.iter().sum();
        session.add_data(&v_input, &[d_sum])?;
    }
    let summary = session.end()?;
    println!(
        "Average cost: {:.6} over {} updates",
        summary.average_cost, summary.updates
    );

    for v_input in [
        [15.0, 15.0, -15.0, 2.0, -3.0],
        [1.0, 11.0, -10.0, 1.0, -3.0],
        [4.0, 4.0, 4.0, 0.0, 0.0],
        [10.0, -2.0, 0.0, 1.0, 1.0],
    ] {
        let v_out = network.forward(&v_input)?;
        println!(
            "{:?} -> {:.4} (expected {})",
            v_input,
            v_out[0],
            v_input.iter().sum::<f64>()
        );
    }
    Ok(())
}

fn main() {
    let mut cfg = GptConfig::default();
    let mut gpt = match Gpt::from_config(&cfg) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Model construction failed: {e}");
            return;
        }
    };

    println!("\n=== MODEL INFORMATION ===");
    println!("Network architecture: {}", gpt.network_description());
    println!(
        "Model configuration -> vocabulary_size: {}, dimensionality: {}, learning_rate: {}",
        cfg.vocabulary_size, cfg.dimensionality, cfg.learning_rate
    );
    println!("Total parameters: {}", gpt.total_parameters());

    let mut s_config_path = "config/gpt.json".to_string();

    loop {
        println!("\n--- Menu Mode ---");
        println!("Commands:");
        println!("  m MLP sum demo");
        println!("  t Train GPT on salutations");
        println!("  g Generate");
        println!("  l Load config");
        println!("  s Save config");
        println!("  e Exit");

        let s_cmd = match prompt("\nEnter command: ") {
            Ok(s) => s.to_lowercase(),
            Err(e) => {
                println!("Input error: {e}");
                continue;
            }
        };

        match s_cmd.as_str() {
            "e" => {
                println!("Exit.");
                break;
            }
            "m" => {
                if let Err(e) = run_sum_demo() {
                    eprintln!("MLP demo failed: {e}");
                }
            }
            "t" => {
                println!("\n=== TRAINING ===");
                match train_gpt(&mut gpt, &SALUTATIONS, &PlateauPolicy::default()) {
                    Ok(report) => println!(
                        "Stopped after {} epochs ({:?}), final loss {:.4}",
                        report.epochs,
                        report.stop,
                        report.final_cost().unwrap_or(f64::NAN)
                    ),
                    Err(e) if e.is_divergence() => eprintln!("DIVERGED! {e}"),
                    Err(e) => eprintln!("Training failed: {e}"),
                }
            }
            "g" => {
                let s_start = match prompt("Enter start text (Enter for \"Hello\"): ") {
                    Ok(s) if s.is_empty() => "Hello".to_string(),
                    Ok(s) => s,
                    Err(e) => {
                        println!("Input error: {e}");
                        continue;
                    }
                };
                let mut s_text = s_start;
                for _ in 0..GENERATE_STEPS {
                    println!("{s_text}");
                    s_text = match gpt.predict_next(&s_text) {
                        Ok(s) => s,
                        Err(e) => {
                            println!("Model output error: {e}");
                            break;
                        }
                    };
                }
            }
            "l" | "s" => {
                let s_path = match prompt("Enter config path or press Enter for default: ") {
                    Ok(s) => s,
                    Err(e) => {
                        println!("Input error: {e}");
                        continue;
                    }
                };
                if !s_path.is_empty() {
                    s_config_path = s_path;
                }

                if s_cmd == "s" {
                    match handgrad::utils::save_config(&s_config_path, &cfg) {
                        Ok(()) => println!("Saved config: {s_config_path}"),
                        Err(e) => println!("Save failed: {e}"),
                    }
                    continue;
                }

                // A new layout means a freshly initialized model.
                match handgrad::utils::load_config(&s_config_path)
                    .and_then(|c| Gpt::from_config(&c).map(|g| (c, g)))
                {
                    Ok((c, g)) => {
                        cfg = c;
                        gpt = g;
                        println!("Loaded config: {s_config_path}");
                        println!("Network architecture: {}", gpt.network_description());
                        println!("Total parameters: {}", gpt.total_parameters());
                    }
                    Err(e) => println!("Load failed: {e}"),
                }
            }
            _ => println!("Unknown command."),
        }
    }
}
