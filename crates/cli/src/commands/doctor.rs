//! `chatptk doctor` — Diagnose configuration, secrets and data files.

use chatptk_config::AppConfig;
use chatptk_tutor::{LessonBook, Roster};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 ChatPTK Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and run again.");
            return Ok(());
        }
    };

    // Check secrets
    if config.api_key.is_some() {
        println!("  ✅ API key configured");
    } else {
        println!("  ❌ No API key — set PTK_API_K or CHATPTK_API_KEY");
        issues += 1;
    }
    if config.session_secret.is_some() {
        println!("  ✅ Session secret configured");
    } else {
        println!("  ❌ No session secret — set CHATPTK_SESSION_SECRET or SECRET_KEY");
        issues += 1;
    }

    // Check data files
    let roster = Roster::load(&config.data.students_path);
    if roster.is_empty() {
        println!(
            "  ⚠️  No students loaded from {}: balance and name lookups are disabled",
            config.data.students_path.display()
        );
        issues += 1;
    } else {
        println!("  ✅ {} student record(s) loaded", roster.len());
    }

    let lessons = LessonBook::load(&config.data.lessons_path);
    if lessons.is_empty() {
        println!(
            "  ⚠️  No lessons loaded from {}",
            config.data.lessons_path.display()
        );
        issues += 1;
    } else {
        println!("  ✅ {} lesson(s) loaded", lessons.len());
    }

    // Check upstream
    if let Some(api_key) = &config.api_key {
        let provider = chatptk_providers::build_from_config(&config, api_key);
        match provider.health_check().await {
            Ok(true) => println!("  ✅ {} reachable", config.provider),
            Ok(false) => {
                println!("  ⚠️  {} responded but reported unhealthy", config.provider);
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ {} unreachable: {e}", config.provider);
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
