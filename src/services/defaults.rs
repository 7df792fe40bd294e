// src/services/defaults.rs
use chrono::{DateTime, Utc};

use crate::models::{AssetId, CurrentStats, DataSource, HistoricalReturns, MetricsRecord, RiskMetrics};

struct AssetDefaults {
    current_price: f64,
    returns: [&'static str; 6],
    volatility: &'static str,
    max_drawdown: &'static str,
    sharpe_ratio: &'static str,
    var_95: &'static str,
}

fn defaults_for(asset: AssetId) -> AssetDefaults {
    match asset {
        AssetId::Equities => AssetDefaults {
            current_price: 25_000.0,
            returns: ["2.1%", "5.2%", "8.5%", "15.0%", "12.0%", "11.0%"],
            volatility: "18.0%",
            max_drawdown: "-22.0%",
            sharpe_ratio: "0.95",
            var_95: "-2.1%",
        },
        AssetId::Gold => AssetDefaults {
            current_price: 65_000.0,
            returns: ["1.5%", "4.2%", "12.5%", "8.0%", "10.0%", "8.5%"],
            volatility: "15.0%",
            max_drawdown: "-18.0%",
            sharpe_ratio: "1.05",
            var_95: "-1.8%",
        },
        AssetId::Bitcoin => AssetDefaults {
            current_price: 4_500_000.0,
            returns: ["-5.2%", "15.8%", "45.2%", "45.0%", "80.0%", "120.0%"],
            volatility: "65.0%",
            max_drawdown: "-75.0%",
            sharpe_ratio: "0.85",
            var_95: "-4.8%",
        },
        AssetId::Reits => AssetDefaults {
            current_price: 180.0,
            returns: ["1.8%", "4.5%", "8.2%", "12.0%", "15.0%", "13.5%"],
            volatility: "22.0%",
            max_drawdown: "-28.0%",
            sharpe_ratio: "0.88",
            var_95: "-2.8%",
        },
    }
}

/// Hand-curated per-asset records; the terminal tier of every resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsTable;

impl DefaultsTable {
    pub fn get(&self, asset: AssetId) -> MetricsRecord {
        self.get_at(asset, Utc::now())
    }

    pub fn get_at(&self, asset: AssetId, at: DateTime<Utc>) -> MetricsRecord {
        let d = defaults_for(asset);
        let [one_month, three_months, six_months, one_year, five_years, ten_years] = d.returns;

        MetricsRecord {
            asset_id: asset,
            current_price: d.current_price,
            last_update: at,
            data_source: DataSource::Default,
            historical_returns: HistoricalReturns {
                one_month: one_month.to_string(),
                three_months: three_months.to_string(),
                six_months: six_months.to_string(),
                one_year: one_year.to_string(),
                five_years: five_years.to_string(),
                ten_years: ten_years.to_string(),
            },
            risk_metrics: RiskMetrics {
                volatility: d.volatility.to_string(),
                max_drawdown: d.max_drawdown.to_string(),
                sharpe_ratio: d.sharpe_ratio.to_string(),
                var_95: d.var_95.to_string(),
            },
            current_stats: CurrentStats {
                current_price: d.current_price,
                sma_50: d.current_price * 0.98,
                sma_200: d.current_price * 0.95,
                avg_annual_return: five_years.to_string(),
            },
            data_quality: None,
        }
    }
}
