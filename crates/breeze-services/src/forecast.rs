//! Display derivations over a forecast response.
//!
//! Everything here is pure. Values are truncated toward zero where the
//! display shows whole numbers.

use breeze_weather::{WeatherCondition, WeatherResponse};
use chrono::{NaiveDate, NaiveDateTime};

const MAX_HOURLY_ITEMS: usize = 24;
const MIN_TIPS: usize = 3;
const MAX_TIPS: usize = 6;

/// UV index bands used for the daily indicator colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl UvLevel {
    pub fn from_index(uv_index: i32) -> Self {
        match uv_index {
            i32::MIN..=2 => UvLevel::Low,
            3..=5 => UvLevel::Moderate,
            6..=7 => UvLevel::High,
            _ => UvLevel::VeryHigh,
        }
    }

    pub fn color_hex(&self) -> &'static str {
        match self {
            UvLevel::Low => "#2dbe8d",
            UvLevel::Moderate => "#f9cf5f",
            UvLevel::High => "#ff9966",
            UvLevel::VeryHigh => "#ff7676",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyItem {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon"
    pub weekday: String,
    /// e.g. "12 Feb"
    pub date_label: String,
    pub condition: WeatherCondition,
    pub icon: &'static str,
    pub max_temperature: i32,
    pub uv_index: i32,
    pub uv_level: UvLevel,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyItem {
    /// "HH:MM"
    pub time: String,
    pub temperature: i32,
    pub icon: &'static str,
    pub humidity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailMetrics {
    pub average_temperature: i32,
    pub average_humidity: i32,
    pub wind_speed: i32,
    pub wind_direction: i32,
    pub uv_index: i32,
}

/// What a tip recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipAction {
    StayHydrated,
    UseSunscreen,
    WearHat,
    WearSunglasses,
    LightJacket,
    WarmClothes,
    WinterJacket,
    BringUmbrella,
    Waterproof,
    StayIndoors,
    DriveCarefully,
    MosquitoAlert,
}

/// Why a tip was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipReason {
    DrinkWater,
    ProtectSkin,
    ProtectFromHeat,
    ProtectEyes,
    NiceDay,
    KeepDrinking,
    BringJacket,
    DressWarmly,
    QuiteCold,
    RainExpected,
    StayDry,
    StormWarning,
    AvoidOutdoors,
    LowVisibility,
    HighUv,
    UseRepellent,
    DrinkRegularly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherTip {
    pub action: TipAction,
    pub reason: TipReason,
}

impl WeatherTip {
    const fn new(action: TipAction, reason: TipReason) -> Self {
        Self { action, reason }
    }
}

/// Big number and subtitle at the top of the display.
#[derive(Debug, Clone, PartialEq)]
pub enum Headline {
    /// Today: current and apparent temperature
    Current { temperature: i32, feels_like: i32 },
    /// A picked forecast day: its high and low
    Day { high: i32, low: i32 },
}

impl Headline {
    pub fn temperature(&self) -> i32 {
        match self {
            Headline::Current { temperature, .. } => *temperature,
            Headline::Day { high, .. } => *high,
        }
    }

    pub fn subtitle(&self) -> String {
        match self {
            Headline::Current { feels_like, .. } => format!("Feels like {}°", feels_like),
            Headline::Day { high, low } => format!("High {}° • Low {}°", high, low),
        }
    }
}

/// "Thursday, 12 Feb"
pub fn date_label(date: NaiveDate) -> String {
    date.format("%A, %d %b").to_string()
}

pub fn daily_items(response: &WeatherResponse, selected: usize) -> Vec<DailyItem> {
    let daily = &response.daily;
    (0..daily.time.len())
        .filter_map(|index| {
            let date = daily.date(index)?;
            let condition = WeatherCondition::from_wmo_code(*daily.weather_code.get(index)?);
            let uv_index = daily.uv_index_max.get(index).map(|uv| *uv as i32).unwrap_or(0);
            Some(DailyItem {
                date,
                weekday: date.format("%a").to_string(),
                date_label: date.format("%d %b").to_string(),
                condition,
                icon: condition.icon_name(),
                max_temperature: *daily.temperature_max.get(index)? as i32,
                uv_index,
                uv_level: UvLevel::from_index(uv_index),
                selected: index == selected,
            })
        })
        .collect()
}

/// Date prefix of forecast day `day`, falling back to the first day
fn target_date(response: &WeatherResponse, day: usize) -> Option<&str> {
    let times = &response.daily.time;
    times.get(day).or_else(|| times.first()).map(String::as_str)
}

pub fn hourly_items(response: &WeatherResponse, day: usize) -> Vec<HourlyItem> {
    let Some(date) = target_date(response, day) else {
        return Vec::new();
    };
    let hourly = &response.hourly;

    hourly
        .time
        .iter()
        .enumerate()
        .filter(|(_, time)| time.starts_with(date))
        .filter_map(|(index, time)| {
            let parsed = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M").ok()?;
            let code = *hourly.weather_code.get(index)?;
            Some(HourlyItem {
                time: parsed.format("%H:%M").to_string(),
                temperature: *hourly.temperature.get(index)? as i32,
                icon: WeatherCondition::from_wmo_code(code).icon_name(),
                humidity: *hourly.humidity.get(index)?,
            })
        })
        .take(MAX_HOURLY_ITEMS)
        .collect()
}

pub fn detail_metrics(response: &WeatherResponse, day: usize) -> Option<DetailMetrics> {
    let daily = &response.daily;
    let hourly = &response.hourly;
    let current = &response.current;
    let date = target_date(response, day)?;

    let mut temperature_sum = 0.0;
    let mut humidity_sum: i64 = 0;
    let mut count: i64 = 0;
    for (index, time) in hourly.time.iter().enumerate() {
        if !time.starts_with(date) {
            continue;
        }
        if let (Some(t), Some(h)) = (hourly.temperature.get(index), hourly.humidity.get(index)) {
            temperature_sum += t;
            humidity_sum += i64::from(*h);
            count += 1;
        }
    }

    let (average_temperature, average_humidity) = if count > 0 {
        (temperature_sum / count as f64, (humidity_sum / count) as i32)
    } else {
        let max = *daily.temperature_max.get(day)?;
        let min = *daily.temperature_min.get(day)?;
        ((max + min) / 2.0, current.humidity)
    };

    Some(DetailMetrics {
        average_temperature: average_temperature as i32,
        average_humidity,
        wind_speed: current.wind_speed as i32,
        wind_direction: current.wind_direction,
        uv_index: daily.uv_index_max.get(day).map(|uv| *uv as i32).unwrap_or(0),
    })
}

/// Advice for the given conditions, at most six tips.
///
/// Short lists get one generic hydration tip appended.
pub fn weather_tips(weather_code: i32, temperature: i32, uv_index: i32, humidity: i32) -> Vec<WeatherTip> {
    use TipAction::*;
    use TipReason::*;

    let mut tips = Vec::with_capacity(MAX_TIPS + 2);

    if temperature >= 30 {
        tips.push(WeatherTip::new(StayHydrated, DrinkWater));
        tips.push(WeatherTip::new(UseSunscreen, ProtectSkin));
        tips.push(WeatherTip::new(WearHat, ProtectFromHeat));
        tips.push(WeatherTip::new(WearSunglasses, ProtectEyes));
    } else if temperature >= 20 {
        tips.push(WeatherTip::new(WearSunglasses, NiceDay));
        tips.push(WeatherTip::new(StayHydrated, KeepDrinking));
    } else if temperature >= 10 {
        tips.push(WeatherTip::new(LightJacket, BringJacket));
    } else {
        tips.push(WeatherTip::new(WarmClothes, DressWarmly));
        tips.push(WeatherTip::new(WinterJacket, QuiteCold));
    }

    let condition = WeatherCondition::from_wmo_code(weather_code);
    if condition.is_wet() {
        tips.push(WeatherTip::new(BringUmbrella, RainExpected));
        tips.push(WeatherTip::new(Waterproof, StayDry));
    } else if condition.is_stormy() {
        tips.push(WeatherTip::new(BringUmbrella, StormWarning));
        tips.push(WeatherTip::new(StayIndoors, AvoidOutdoors));
    } else if condition == WeatherCondition::Fog {
        tips.push(WeatherTip::new(DriveCarefully, LowVisibility));
    } else if condition == WeatherCondition::ClearSky && uv_index > 5 {
        tips.push(WeatherTip::new(UseSunscreen, HighUv));
    }

    if humidity > 70 {
        tips.push(WeatherTip::new(MosquitoAlert, UseRepellent));
    }

    if tips.len() < MIN_TIPS {
        tips.push(WeatherTip::new(StayHydrated, DrinkRegularly));
    }

    tips.truncate(MAX_TIPS);
    tips
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use breeze_weather::{CurrentWeather, DailyWeather, HourlyWeather};

    fn response() -> WeatherResponse {
        let mut hourly = HourlyWeather::default();
        for day in ["2026-02-12", "2026-02-13"] {
            for hour in 0..26 {
                // 26 entries per date to exercise the 24-item cap
                hourly.time.push(format!("{}T{:02}:00", day, hour % 24));
                hourly.temperature.push(10.0 + (hour % 4) as f64);
                hourly.weather_code.push(1);
                hourly.humidity.push(60);
            }
        }

        WeatherResponse {
            latitude: 41.9,
            longitude: 12.5,
            timezone: "Europe/Rome".into(),
            current: CurrentWeather {
                time: "2026-02-12T10:00".into(),
                temperature: 14.7,
                humidity: 55,
                apparent_temperature: 13.2,
                weather_code: 1,
                wind_speed: 12.9,
                wind_direction: 200,
            },
            hourly,
            daily: DailyWeather {
                time: vec!["2026-02-12".into(), "2026-02-13".into(), "2026-02-14".into()],
                weather_code: vec![1, 61, 95],
                temperature_max: vec![16.8, 12.1, 9.9],
                temperature_min: vec![8.2, 7.0, 3.0],
                uv_index_max: vec![2.9, 5.5, 7.9],
            },
        }
    }

    #[test]
    fn test_uv_levels() {
        assert_eq!(UvLevel::from_index(0), UvLevel::Low);
        assert_eq!(UvLevel::from_index(2), UvLevel::Low);
        assert_eq!(UvLevel::from_index(5), UvLevel::Moderate);
        assert_eq!(UvLevel::from_index(7), UvLevel::High);
        assert_eq!(UvLevel::from_index(8), UvLevel::VeryHigh);
        assert_eq!(UvLevel::High.color_hex(), "#ff9966");
    }

    #[test]
    fn test_daily_items() {
        let items = daily_items(&response(), 1);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].weekday, "Thu");
        assert_eq!(items[0].date_label, "12 Feb");
        assert_eq!(items[0].max_temperature, 16);
        assert_eq!(items[0].uv_index, 2);
        assert_eq!(items[0].uv_level, UvLevel::Low);
        assert!(items[1].selected);
        assert_eq!(items[1].icon, "rain");
        assert_eq!(items[2].uv_level, UvLevel::High);
    }

    #[test]
    fn test_hourly_items_filtered_and_capped() {
        let items = hourly_items(&response(), 1);
        assert_eq!(items.len(), 24);
        assert_eq!(items[0].time, "00:00");
        assert_eq!(items[23].time, "23:00");
    }

    #[test]
    fn test_hourly_items_for_day_without_hours() {
        assert!(hourly_items(&response(), 2).is_empty());
    }

    #[test]
    fn test_detail_metrics_averages_hourly() {
        let metrics = detail_metrics(&response(), 0).unwrap();
        assert_eq!(metrics.average_humidity, 60);
        assert_eq!(metrics.average_temperature, 11);
        assert_eq!(metrics.wind_speed, 12);
        assert_eq!(metrics.wind_direction, 200);
        assert_eq!(metrics.uv_index, 2);
    }

    #[test]
    fn test_detail_metrics_falls_back_to_daily_range() {
        let metrics = detail_metrics(&response(), 2).unwrap();
        assert_eq!(metrics.average_temperature, 6);
        assert_eq!(metrics.average_humidity, 55);
        assert_eq!(metrics.uv_index, 7);
    }

    #[test]
    fn test_tips_hot_clear_day() {
        let tips = weather_tips(0, 32, 8, 40);
        let actions: Vec<_> = tips.iter().map(|t| t.action).collect();
        assert_eq!(
            actions,
            vec![
                TipAction::StayHydrated,
                TipAction::UseSunscreen,
                TipAction::WearHat,
                TipAction::WearSunglasses,
                TipAction::UseSunscreen,
            ]
        );
        assert_eq!(tips[4].reason, TipReason::HighUv);
    }

    #[test]
    fn test_tips_are_padded_to_three() {
        let tips = weather_tips(2, 15, 0, 50);
        assert_eq!(tips.len(), 2);
        assert_eq!(tips[0].action, TipAction::LightJacket);
        assert_eq!(tips[1].reason, TipReason::DrinkRegularly);
    }

    #[test]
    fn test_tips_are_capped_at_six() {
        let tips = weather_tips(95, 35, 0, 90);
        assert_eq!(tips.len(), 6);
        assert_eq!(tips[4].action, TipAction::BringUmbrella);
        assert_eq!(tips[5].action, TipAction::StayIndoors);
    }

    #[test]
    fn test_headline_and_date_label() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        assert_eq!(date_label(date), "Thursday, 12 Feb");
        assert_eq!(Headline::Day { high: 16, low: 8 }.subtitle(), "High 16° • Low 8°");
        assert_eq!(
            Headline::Current { temperature: 14, feels_like: 13 }.temperature(),
            14
        );
    }
}
