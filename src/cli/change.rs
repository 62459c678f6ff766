use super::ui;
use crate::core::config::{Investment, Portfolio};
use crate::core::{analytics, CurrencyRateProvider, HistoricalPeriod, PriceProvider, PriceResult};
use anyhow::Result;
use comfy_table::{Attribute, Cell};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::collections::HashMap;

#[derive(Clone)]
struct ChangeResult {
    identifier: String,
    short_name: Option<String>,
    changes: BTreeMap<HistoricalPeriod, f64>,
    error: Option<String>,
}

struct PortfolioChangeResult {
    name: String,
    investment_changes: Vec<ChangeResult>,
    portfolio_changes: BTreeMap<HistoricalPeriod, f64>,
}

pub async fn run(
    portfolios: &[Portfolio],
    symbol_provider: &(dyn PriceProvider + Send + Sync),
    isin_provider: &(dyn PriceProvider + Send + Sync),
    currency_provider: &(dyn CurrencyRateProvider + Send + Sync),
    target_currency: &str,
) -> anyhow::Result<()> {
    let mut investments_to_fetch = HashMap::new();
    for portfolio in portfolios {
        for investment in &portfolio.investments {
            match investment {
                Investment::Stock(s) => {
                    investments_to_fetch.insert(s.symbol.clone(), symbol_provider);
                }
                Investment::MutualFund(mf) => {
                    investments_to_fetch.insert(mf.isin.clone(), isin_provider);
                }
                Investment::FixedDeposit(_) => {}
            }
        }
    }

    if investments_to_fetch.is_empty() {
        println!("No stock or mutual fund investments found to display changes for.");
        return Ok(());
    }

    // Step 1: Fetch all prices concurrently
    let pb = ui::new_progress_bar(investments_to_fetch.len() as u64, false);
    let price_futures = investments_to_fetch.iter().map(|(id, provider)| {
        let pb_clone = pb.clone();
        async move {
            let res = provider.fetch_price(id).await;
            pb_clone.inc(1);
            (id.clone(), res)
        }
    });
    let price_results: HashMap<String, Result<PriceResult>> =
        join_all(price_futures).await.into_iter().collect();
    pb.finish_and_clear();

    // Step 2: Process results for each portfolio
    let num_portfolios = portfolios.len();
    for (i, portfolio) in portfolios.iter().enumerate() {
        let result = calculate_portfolio_changes(
            portfolio,
            &price_results,
            currency_provider,
            target_currency,
        )
        .await;

        if !result.investment_changes.is_empty() {
            println!(
                "\nPortfolio: {}",
                ui::style_text(&result.name, ui::StyleType::Title)
            );
            display_results(&result);

            if i < num_portfolios - 1 {
                ui::print_separator();
            }
        }
    }

    Ok(())
}

async fn calculate_portfolio_changes(
    portfolio: &Portfolio,
    price_results: &HashMap<String, Result<PriceResult>>,
    currency_provider: &(dyn CurrencyRateProvider + Send + Sync),
    target_currency: &str,
) -> PortfolioChangeResult {
    // First, get weights for all investments in the portfolio
    let holdings = analytics::calculate_portfolio_value(
        portfolio,
        price_results,
        currency_provider,
        target_currency,
        &|| (), // No progress updates needed here
    )
    .await;

    let mut investment_changes = Vec::new();
    let mut portfolio_changes: BTreeMap<HistoricalPeriod, f64> = BTreeMap::new();
    let mut period_contributors: BTreeMap<HistoricalPeriod, f64> = BTreeMap::new();

    for holding in &holdings.investments {
        // Skip fixed deposits as they don't have historical price changes
        if holding.units.is_none() {
            continue;
        }

        if let Some(e) = &holding.error {
            investment_changes.push(ChangeResult {
                identifier: holding.identifier.clone(),
                short_name: holding.short_name.clone(),
                changes: BTreeMap::new(),
                error: Some(e.clone()),
            });
            continue;
        }

        // Calculate percentage change for this investment
        let changes = if let Some(Ok(price_data)) = price_results.get(&holding.identifier) {
            price_data
                .historical_prices
                .iter()
                .filter_map(|(period, historical_price)| {
                    if *historical_price > 0.0 {
                        let change =
                            ((price_data.price - historical_price) / historical_price) * 100.0;
                        Some((*period, change))
                    } else {
                        None
                    }
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        // Add this investment's weighted change to the portfolio total
        if let Some(weight) = holding.weight {
            for (period, change) in &changes {
                let weighted_value = change * (weight / 100.0);
                *portfolio_changes.entry(*period).or_insert(0.0) += weighted_value;
                *period_contributors.entry(*period).or_insert(0.0) += weight / 100.0;
            }
        }

        investment_changes.push(ChangeResult {
            identifier: holding.identifier.clone(),
            short_name: holding.short_name.clone(),
            changes,
            error: None,
        });
    }

    // Normalize weighted changes for periods where total weight might not be 100%
    for (period, total_weight) in &period_contributors {
        if let Some(weighted_change) = portfolio_changes.get_mut(period) {
            if *total_weight > 0.0 {
                *weighted_change /= *total_weight;
            }
        }
    }

    PortfolioChangeResult {
        name: portfolio.name.clone(),
        investment_changes,
        portfolio_changes,
    }
}

fn display_results(result: &PortfolioChangeResult) {
    let mut table = ui::new_styled_table();

    let mut periods: Vec<HistoricalPeriod> = vec![
        HistoricalPeriod::OneDay,
        HistoricalPeriod::FiveDays,
        HistoricalPeriod::OneMonth,
        HistoricalPeriod::OneYear,
        HistoricalPeriod::ThreeYears,
        HistoricalPeriod::FiveYears,
        HistoricalPeriod::TenYears,
    ];
    periods.sort(); // Ensure consistent order

    let mut header = vec![ui::header_cell("Identifier")];
    for period in &periods {
        header.push(ui::header_cell(&period.to_string()));
    }
    table.set_header(header);

    for result in &result.investment_changes {
        let identifier_cell_content = if let Some(name) = &result.short_name {
            name.clone()
        } else {
            result.identifier.clone()
        };
        let mut row_cells = vec![Cell::new(identifier_cell_content)];

        for period in &periods {
            let cell = match result.changes.get(period) {
                Some(change) => ui::change_cell(*change),
                None => ui::na_cell(result.error.is_some()),
            };
            row_cells.push(cell);
        }
        table.add_row(row_cells);
    }

    if !result.portfolio_changes.is_empty() && result.investment_changes.len() > 1 {
        let mut total_row_cells =
            vec![Cell::new("Portfolio Weighted").add_attribute(Attribute::Bold)];
        for period in &periods {
            let cell = match result.portfolio_changes.get(period) {
                Some(change) => ui::change_cell(*change),
                None => ui::na_cell(false),
            };
            total_row_cells.push(cell);
        }
        table.add_row(total_row_cells);
    }

    println!("{table}");
}
